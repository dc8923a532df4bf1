use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use md_mailer::article::FsArticleStore;
use md_mailer::compose::{Recipients, SystemClock, UuidContentIds};
use md_mailer::config::MailConfig;
use md_mailer::confirm::StdinConfirm;
use md_mailer::mailer::{Mailer, MailerDeps, SendRequest};
use md_mailer::render::MarkdownRenderer;
use md_mailer::transport::{SmtpDelivery, SmtpSettings};

/// Send a Markdown article as an HTML email.
#[derive(Debug, Parser)]
#[command(name = "md-mailer", version)]
struct Cli {
    /// Article path relative to the workbench; the most recently modified
    /// article when omitted.
    md_file: Option<String>,

    /// Recipient address (repeatable).
    #[arg(short = 'a', long = "to")]
    to: Vec<String>,

    /// Subject line; `$now` and `$last_week` are replaced with dates.
    #[arg(short, long)]
    subject: Option<String>,

    /// Send without asking for confirmation.
    #[arg(long)]
    silent: bool,

    /// Directory containing the Markdown articles.
    #[arg(short, long, default_value = ".")]
    workbench: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage; a second install is harmless.
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workbench = cli
        .workbench
        .canonicalize()
        .unwrap_or_else(|_| cli.workbench.clone());

    // ── Config ──────────────────────────────────────────────────────────
    let config = MailConfig::load(&workbench)?;
    config.validate()?;
    let settings = SmtpSettings::from_config(&config)?;

    // ── Articles ────────────────────────────────────────────────────────
    let store = FsArticleStore::scan(workbench.clone()).await?;

    let deps = MailerDeps {
        store: Arc::new(store),
        renderer: Arc::new(MarkdownRenderer::new()),
        transport: Arc::new(SmtpDelivery::new(settings)),
        confirm: Arc::new(StdinConfirm),
        clock: Arc::new(SystemClock),
        content_ids: Arc::new(UuidContentIds),
    };
    let mailer = Mailer::new(config, workbench, deps);

    let summary = mailer
        .send(SendRequest {
            to: Recipients::from_args(cli.to),
            md_file: cli.md_file,
            subject: cli.subject,
            silent: cli.silent,
        })
        .await?;

    eprintln!("✅ Email sent");
    eprintln!("   Subject:  {}", summary.subject);
    eprintln!("   Markdown: {}", summary.article);
    eprintln!("   To:       {}", summary.recipients.join(", "));
    Ok(())
}
