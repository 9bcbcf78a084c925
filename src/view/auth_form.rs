use super::status::FormStatus;
use crate::{backend::SessionProvider, errors::ClientError, models::identity::Identity};
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    pub fn title(self) -> &'static str {
        match self {
            Self::Login => "Welcome Back!",
            Self::Register => "Create an Account",
        }
    }

    pub fn button_text(self) -> &'static str {
        match self {
            Self::Login => "Sign In",
            Self::Register => "Sign Up",
        }
    }
}

/// Email/password form shared by the login and register pages.
#[derive(Clone, Debug)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub status: FormStatus,
}

impl AuthForm {
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            email: String::new(),
            password: String::new(),
            status: FormStatus::Idle,
        }
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
        self.status = FormStatus::Idle;
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
        self.status = FormStatus::Idle;
    }

    /// Sign in or register with the entered credentials.
    ///
    /// On failure the provider's message is kept on the form; redirecting on
    /// success is up to the caller.
    pub async fn submit(&mut self, provider: &dyn SessionProvider) -> Result<Identity, ClientError> {
        self.status = FormStatus::Submitting;

        let result = match self.mode {
            AuthMode::Login => provider.sign_in(&self.email, &self.password).await,
            AuthMode::Register => provider.sign_up(&self.email, &self.password).await,
        };

        match result {
            Ok(identity) => {
                self.status = FormStatus::Idle;
                self.password.clear();
                Ok(identity)
            }
            Err(err) => {
                error!("{:?} failed: {}", self.mode, err);
                self.status = FormStatus::Failed(format!("{} ({})", err, err.code()));
                Err(err.into())
            }
        }
    }
}
