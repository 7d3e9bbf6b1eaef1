//! Attendance Kiosk CLI
//!
//! Command-line front end for trying the attendance flow: an in-memory
//! demo of both dashboards, issuing a token against a live backend, and
//! redeeming a code by hand.

use attendance_scan::{
    backend::{HttpBackend, InMemoryBackend, SessionId},
    capture::{CameraSessionManager, Frame, MockCamera},
    config::FileConfig,
    metrics::MetricsRegistry,
    orchestrator::{StudentConsole, TeacherConsole, TeacherEvent},
    redeem::{RedemptionAttempt, RedemptionClient},
    scan::FnDecoder,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "attendance-kiosk", version, about = "QR attendance kiosk")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run both dashboards against an in-memory backend.
    Demo,
    /// Issue a token for a session and count it down.
    Issue {
        session: u64,
        #[arg(long)]
        subject: Option<String>,
        /// Write the decoded QR image to this path.
        #[arg(long)]
        save_image: Option<PathBuf>,
    },
    /// Redeem a scanned payload or typed code for the signed-in student.
    Redeem { code: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Attendance Kiosk v{}", attendance_scan::VERSION);

    let config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };

    let outcome = match cli.command {
        Command::Demo => demo(&config).await,
        Command::Issue {
            session,
            subject,
            save_image,
        } => issue(&config, SessionId(session), subject, save_image).await,
        Command::Redeem { code } => redeem(&config, code).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<bool, Box<dyn std::error::Error>>;

async fn demo(config: &FileConfig) -> CliResult {
    info!("This is a demonstration using an in-memory backend and mock camera input");
    let metrics = MetricsRegistry::new()?;

    let backend = Arc::new(InMemoryBackend::new());
    let session = SessionId(1);
    backend.add_session(session, "Physics", "Ms. Iyer");
    backend.enroll(session, "Asha", "12", "10-A");
    backend.enroll(session, "Ravi", "13", "10-A");
    backend.sign_in("Asha");

    let mut teacher = TeacherConsole::new(backend.clone(), config.roster.refresh_interval())
        .with_metrics(metrics.clone());
    let token = teacher.generate_token(session, Some("Physics")).await?;
    info!(code = token.fallback_code(), "token on screen");
    if let Some(TeacherEvent::Countdown { .. }) = teacher.next_event().await {
        info!("{}", teacher.expiry_label().unwrap_or_default());
    }

    // The mock camera films a blank scene; the decoder stands in for the
    // code being held up to it.
    let payload = format!("attendance:{}:{}", token.credential, session);
    let decoder = FnDecoder(move |frame: &Frame| (frame.sequence() >= 3).then(|| payload.clone()));
    let mut student = StudentConsole::new(
        backend.clone(),
        CameraSessionManager::new(MockCamera::new()),
        decoder,
        config,
    )
    .with_metrics(metrics.clone());

    student.open_scanner().await?;
    if let Some(result) = student.scan().await? {
        println!("Scan: {}", result.message());
    }

    student.open_manual_entry();
    let repeat = student.submit_manual(token.fallback_code()).await?;
    println!("Manual entry: {}", repeat.message());

    student.open_face_capture(session).await?;
    let face = student.capture_face().await?;
    println!("Face capture: {}", face.message());
    student.close();

    let summary = student.summary();
    println!(
        "Today: {}/{} sessions attended ({}%)",
        summary.present,
        summary.total,
        summary.percentage()
    );

    for entry in teacher.refresh_roster().await? {
        println!(
            "{:<8} {}",
            entry.student_name,
            entry.status.as_deref().unwrap_or("absent")
        );
    }
    teacher.close();

    info!("Metrics:\n{}", metrics.encode()?);
    Ok(true)
}

async fn issue(
    config: &FileConfig,
    session: SessionId,
    subject: Option<String>,
    save_image: Option<PathBuf>,
) -> CliResult {
    let backend = HttpBackend::from_config(&config.backend)?;
    let mut teacher = TeacherConsole::new(Arc::new(backend), config.roster.refresh_interval());

    let token = teacher.generate_token(session, subject.as_deref()).await?;
    println!("Code: {}", token.fallback_code());

    if let Some(path) = save_image {
        match token.image_bytes() {
            Some(bytes) => {
                std::fs::write(&path, bytes)?;
                info!(path = %path.display(), "QR image saved");
            }
            None => warn!("QR image is not an inline data URL, nothing saved"),
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, clearing token");
                teacher.close();
                return Ok(true);
            }
            event = teacher.next_event() => match event {
                Some(TeacherEvent::Countdown { remaining_secs }) => {
                    if remaining_secs % 30 == 0 || remaining_secs <= 10 {
                        println!("{}", teacher.expiry_label().unwrap_or_default());
                    }
                }
                Some(TeacherEvent::TokenExpired) => {
                    println!("Expired");
                    return Ok(true);
                }
                Some(TeacherEvent::RosterRefreshed { refreshed: true }) => {
                    let present = teacher.roster().iter().filter(|e| e.is_present()).count();
                    println!("Present: {}/{}", present, teacher.roster().len());
                }
                Some(TeacherEvent::RosterRefreshed { refreshed: false }) => {}
                None => return Ok(true),
            }
        }
    }
}

async fn redeem(config: &FileConfig, code: String) -> CliResult {
    let backend = HttpBackend::from_config(&config.backend)?;
    let client = RedemptionClient::new(Arc::new(backend));

    let result = client.submit(RedemptionAttempt::ManualCode(code)).await;
    println!("{}", result.message());
    Ok(result.is_success())
}
