use super::{
    auth_form::{AuthForm, AuthMode},
    files_page::FilesPage,
    files_table,
    remote_form::RemoteForm,
    status::{Notice, Notifier},
    upload_form::UploadForm,
};
use crate::{
    backend::SessionProvider,
    errors::ClientError,
    models::{file::FileDescriptor, identity::Identity},
    services::{DeleteOutcome, LocalFile, SessionContext, Services},
};
use std::{fmt, path::Path, sync::Arc};
use tracing::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    MyFiles,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Self::Home),
            "/login" => Some(Self::Login),
            "/register" => Some(Self::Register),
            "/my-files" => Some(Self::MyFiles),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::MyFiles => "/my-files",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Where a request for `requested` lands given the session state.
pub fn resolve_route(requested: Route, signed_in: bool) -> Route {
    match (requested, signed_in) {
        (Route::Home, true) => Route::MyFiles,
        (Route::Home, false) => Route::Login,
        (Route::Login | Route::Register, true) => Route::MyFiles,
        (Route::MyFiles, false) => Route::Login,
        (route, _) => route,
    }
}

/// Application shell: routing plus the page and forms behind each route.
pub struct Shell {
    session: Arc<dyn SessionProvider>,
    services: Services,
    notifier: Notifier,
    route: Route,
    pub page: FilesPage,
    pub upload_form: UploadForm,
    pub remote_form: RemoteForm,
}

impl Shell {
    pub fn new(session: Arc<dyn SessionProvider>, services: Services, max_upload_bytes: u64) -> Self {
        Self {
            session,
            services,
            notifier: Notifier::default(),
            route: Route::Home,
            page: FilesPage::default(),
            upload_form: UploadForm::new(max_upload_bytes),
            remote_form: RemoteForm::default(),
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::from_provider(self.session.as_ref())
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notifier.drain()
    }

    /// Navigate to `path`, following redirects. Unknown paths go home.
    pub async fn navigate(&mut self, path: &str) -> Route {
        let requested = Route::parse(path).unwrap_or(Route::Home);
        let ctx = self.context();
        let landed = resolve_route(requested, ctx.is_signed_in());
        if landed != requested {
            debug!("redirecting {} -> {}", requested, landed);
        }
        self.route = landed;

        if landed == Route::MyFiles {
            // the table keeps its last rows
            if let Err(err) = self.page.refresh(&ctx, &self.services.files).await {
                self.notifier.failure("Error fetching files", err.to_string());
            }
        }
        landed
    }

    pub async fn register(&mut self, email: &str, password: &str) -> Result<Identity, ClientError> {
        self.authenticate(AuthMode::Register, email, password).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<Identity, ClientError> {
        self.authenticate(AuthMode::Login, email, password).await
    }

    async fn authenticate(
        &mut self,
        mode: AuthMode,
        email: &str,
        password: &str,
    ) -> Result<Identity, ClientError> {
        let mut form = AuthForm::new(mode);
        form.set_email(email);
        form.set_password(password);
        let identity = form.submit(self.session.as_ref()).await?;
        self.navigate(Route::MyFiles.path()).await;
        Ok(identity)
    }

    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        self.session.sign_out().await.map_err(|err| {
            error!("error signing out: {}", err);
            ClientError::from(err)
        })?;
        self.page = FilesPage::default();
        self.navigate(Route::Login.path()).await;
        Ok(())
    }

    /// Upload a local file through the upload form.
    pub async fn upload(
        &mut self,
        path: impl AsRef<Path>,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<FileDescriptor, ClientError> {
        let path = path.as_ref();
        let file = LocalFile::open(path).await.map_err(|err| {
            ClientError::InvalidInput(format!("Could not read {}: {}", path.display(), err))
        })?;
        if !self.upload_form.select(file) {
            let message = self.upload_form.status.error().unwrap_or_default();
            return Err(ClientError::InvalidInput(message.to_string()));
        }

        let ctx = self.context();
        let uploaded = self
            .upload_form
            .submit_with_progress(&ctx, &self.services.upload, &self.notifier, on_progress)
            .await?;
        Ok(self.page.on_uploaded(&ctx, &self.services.files, uploaded).await)
    }

    pub async fn add_remote(&mut self, source_url: &str) -> Result<FileDescriptor, ClientError> {
        let ctx = self.context();
        self.remote_form.set_url(source_url);
        let descriptor = self
            .remote_form
            .submit(&ctx, &self.services.remote, &self.notifier)
            .await?;
        self.page
            .on_remote_added(&ctx, &self.services.files, descriptor.clone())
            .await;
        Ok(descriptor)
    }

    pub async fn delete(&mut self, id_or_path: &str) -> Result<DeleteOutcome, ClientError> {
        let ctx = self.context();
        self.page
            .delete_file(&ctx, &self.services.files, &self.notifier, id_or_path)
            .await
    }

    pub fn render(&self) -> String {
        let header = match self.context().identity() {
            Some(identity) => format!("RetroShare | {} | My Files | Logout", identity.email),
            None => "RetroShare | Login | Register".to_string(),
        };
        let body = match self.route {
            Route::Home => "Loading RetroShare...".to_string(),
            Route::Login => AuthMode::Login.title().to_string(),
            Route::Register => AuthMode::Register.title().to_string(),
            Route::MyFiles => files_table::render(
                self.page.files(),
                self.page.loading,
                self.page.deleting.as_deref(),
            ),
        };
        format!("{}\n\n{}", header, body.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            MockJobInvoker, db, local_auth::LocalSessionProvider, local_blobs::LocalBlobStore,
        },
        view::Tone,
    };

    #[tokio::test]
    async fn failed_listing_raises_a_notice() {
        let dir = tempfile::tempdir().unwrap();
        let auth_url = format!("sqlite://{}", dir.path().join("auth.db").display());
        let blob_url = format!("sqlite://{}", dir.path().join("blobs.db").display());
        let auth_pool = Arc::new(db::connect(&auth_url).await.unwrap());
        let blob_pool = Arc::new(db::connect(&blob_url).await.unwrap());

        let session = Arc::new(LocalSessionProvider::open(auth_pool).await.unwrap());
        let blobs = Arc::new(LocalBlobStore::new(
            blob_pool.clone(),
            dir.path().join("objects"),
            "http://files.test",
        ));
        let services = Services::new(blobs, Arc::new(MockJobInvoker::new()));
        let mut shell = Shell::new(session, services, 1024);

        shell.register("user@example.com", "Passw0rd!").await.unwrap();
        assert!(shell.notices().is_empty());

        blob_pool.close().await;
        assert_eq!(shell.navigate("/my-files").await, Route::MyFiles);
        let notices = shell.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Error fetching files");
        assert_eq!(notices[0].tone, Tone::Destructive);
    }

    #[test]
    fn routes_parse_and_redirect() {
        assert_eq!(Route::parse("/"), Some(Route::Home));
        assert_eq!(Route::parse("/my-files/"), Some(Route::MyFiles));
        assert_eq!(Route::parse("/admin"), None);

        assert_eq!(resolve_route(Route::Home, true), Route::MyFiles);
        assert_eq!(resolve_route(Route::Home, false), Route::Login);
        assert_eq!(resolve_route(Route::Register, true), Route::MyFiles);
        assert_eq!(resolve_route(Route::Register, false), Route::Register);
        assert_eq!(resolve_route(Route::MyFiles, false), Route::Login);
        assert_eq!(resolve_route(Route::MyFiles, true), Route::MyFiles);
    }
}
