use anyhow::{Context, Result, bail};
use axum::Router;
use clap::Parser;
use retroshare::{
    backend::{
        db, http_jobs::HttpJobInvoker, local_auth::LocalSessionProvider,
        local_blobs::LocalBlobStore,
    },
    config::{AppConfig, Cli, Command},
    routes,
    services::Services,
    view::{Route, Shell, Tone},
};
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr keeps command output clean) ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (host, port) = match &cli.command {
        Command::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    let cfg = AppConfig::resolve(&cli.global, host, port)?;
    tracing::debug!("Resolved config: {:?}", cfg);

    // --- Storage ---
    fs::create_dir_all(&cfg.storage_dir)
        .await
        .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
    let db = Arc::new(db::connect(&cfg.database_url).await?);
    let blobs = LocalBlobStore::new(db.clone(), &cfg.storage_dir, &cfg.public_url);

    if matches!(cli.command, Command::Serve { .. }) {
        return serve(&cfg, blobs).await;
    }

    // --- Client ---
    let session = Arc::new(LocalSessionProvider::open(db).await?);
    let jobs = Arc::new(HttpJobInvoker::new(&cfg.functions_url));
    let services = Services::new(Arc::new(blobs), jobs);
    let mut shell = Shell::new(session, services, cfg.max_upload_bytes);
    shell.navigate(Route::Home.path()).await;

    let outcome = run(&mut shell, cli.command).await;
    for notice in shell.notices() {
        let marker = match notice.tone {
            Tone::Default => "*",
            Tone::Destructive => "!",
        };
        eprintln!("{} {}: {}", marker, notice.title, notice.description);
    }
    outcome
}

async fn run(shell: &mut Shell, command: Command) -> Result<()> {
    match command {
        Command::Signup { email, password } => {
            let identity = shell.register(&email, &password).await?;
            println!("Signed up as {}", identity.email);
            println!("{}", shell.render());
        }
        Command::Login { email, password } => {
            let identity = shell.login(&email, &password).await?;
            println!("Signed in as {}", identity.email);
            println!("{}", shell.render());
        }
        Command::Logout => {
            shell.sign_out().await?;
            println!("Signed out.");
        }
        Command::Whoami => match shell.context().identity() {
            Some(identity) => println!("{} ({})", identity.email, identity.uid),
            None => println!("Not signed in."),
        },
        Command::List => {
            require_files_page(shell).await?;
            println!("{}", shell.render());
        }
        Command::Upload { path } => {
            require_files_page(shell).await?;
            let descriptor = shell
                .upload(&path, &mut |progress: f64| {
                    eprint!("\rUploading... {:>3.0}%", progress);
                })
                .await;
            eprintln!();
            let descriptor = descriptor?;
            println!("Uploaded {} ({})", descriptor.name, descriptor.size);
            println!("{}", descriptor.download_url);
        }
        Command::Remote { url } => {
            require_files_page(shell).await?;
            let descriptor = shell.add_remote(&url).await?;
            println!(
                "Remote file \"{}\" processing has been initiated.",
                descriptor.name
            );
            println!("{}", shell.render());
        }
        Command::Delete { id } => {
            require_files_page(shell).await?;
            let outcome = shell.delete(&id).await?;
            tracing::debug!("delete outcome for {}: {:?}", id, outcome);
            println!("{}", shell.render());
        }
        Command::Serve { .. } => bail!("serve does not run inside the client shell"),
    }
    Ok(())
}

async fn require_files_page(shell: &mut Shell) -> Result<()> {
    if shell.navigate(Route::MyFiles.path()).await != Route::MyFiles {
        bail!("You must be signed in to do that. Run `retroshare login` first.");
    }
    Ok(())
}

async fn serve(cfg: &AppConfig, blobs: LocalBlobStore) -> Result<()> {
    let app: Router = routes::routes::routes().with_state(blobs);

    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Serving downloads on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
