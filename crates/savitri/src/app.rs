use crate::{
    AppCommand, AppResult,
    app_command::HELP,
    platform::{Prompt, PromptAuthenticator},
};

use std::sync::Arc;

use savitri_core::{
    BiometricGateController, BiometricSnapshot, RecordingSessionController, RecordingSnapshot,
    RecordingState,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    task::JoinSet,
};
use tracing::{error, info, instrument, warn};

/// One-line description of a recording snapshot.
pub(crate) fn describe_recording(snapshot: &RecordingSnapshot) -> String {
    let mut line = format!("recording: {}", snapshot.state);

    if let Some(path) = &snapshot.resource_path {
        line.push_str(&format!(" -> {}", path.display()));
    }
    if snapshot.state == RecordingState::Recording {
        line.push_str(&format!(" level {:.2}", snapshot.amplitude));
    }
    if snapshot.state.is_active() {
        line.push_str(&format!(" ({:.1}s)", snapshot.duration().as_secs_f64()));
    }
    if let Some(kind) = snapshot.last_failure {
        line.push_str(&format!(" [last failure: {:?}]", kind));
    }

    line
}

/// One-line description of a biometric snapshot.
pub(crate) fn describe_biometric(snapshot: &BiometricSnapshot) -> String {
    let mut line = format!(
        "biometric: {} ({}) available={} enabled={} enrolled={}",
        snapshot.biometric_type_name(),
        snapshot.biometric_icon().as_str(),
        snapshot.is_available(),
        snapshot.is_enabled(),
        snapshot.is_enrolled(),
    );

    if snapshot.is_authenticating() {
        line.push_str(" authenticating");
    }
    if let Some(kind) = snapshot.last_failure() {
        line.push_str(&format!(" [last failure: {:?}]", kind));
    }

    line
}

/// The fields whose change is worth a console line. Amplitude ticks are not.
fn recording_headline(snapshot: &RecordingSnapshot) -> (RecordingState, bool) {
    (snapshot.state, snapshot.resource_path.is_some())
}

fn biometric_headline(snapshot: &BiometricSnapshot) -> (bool, bool, bool, bool) {
    (
        snapshot.is_available(),
        snapshot.is_enabled(),
        snapshot.is_enrolled(),
        snapshot.is_authenticating(),
    )
}

/// Console front end over both controllers.
///
/// Controller operations run on spawned tasks so the loop keeps reading
/// input while an operation waits on the authenticator; that is how a
/// challenge gets answered.
pub struct App {
    pub(crate) recording: Arc<RecordingSessionController>,
    pub(crate) biometric: Arc<BiometricGateController>,
    pub(crate) authenticator: Arc<PromptAuthenticator>,
    pub(crate) prompt_rx: mpsc::Receiver<Prompt>,
    pub(crate) tasks: JoinSet<()>,
}

impl App {
    pub(crate) fn new(
        recording: Arc<RecordingSessionController>,
        biometric: Arc<BiometricGateController>,
        authenticator: Arc<PromptAuthenticator>,
        prompt_rx: mpsc::Receiver<Prompt>,
    ) -> Self {
        Self {
            recording,
            biometric,
            authenticator,
            prompt_rx,
            tasks: JoinSet::new(),
        }
    }

    /// Run the main application event loop until `quit` or end of input.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("Savitri starting");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut recording_updates = self.recording.subscribe();
        let mut biometric_updates = self.biometric.subscribe();
        let mut recording_shown = recording_headline(&recording_updates.current());
        let mut biometric_shown = biometric_headline(&biometric_updates.current());

        println!("{HELP}");
        println!("{}", describe_recording(&self.recording.snapshot()));
        println!("{}", describe_biometric(&self.biometric.snapshot()));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("Console closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match AppCommand::parse(&line) {
                        Ok(AppCommand::Quit) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Ok(command) => self.dispatch(command),
                        Err(e) => {
                            warn!(error = %e, "Rejected console input");
                            println!("? {}", line.trim());
                        }
                    }
                }

                Some(prompt) = self.prompt_rx.recv() => {
                    // Skip prompts cancelled before they were shown.
                    if self.authenticator.is_pending() {
                        println!("[challenge {}] {} (approve / deny)", prompt.id, prompt.reason);
                    }
                }

                true = recording_updates.changed() => {
                    let snapshot = recording_updates.current();
                    let headline = recording_headline(&snapshot);
                    if headline != recording_shown {
                        recording_shown = headline;
                        println!("{}", describe_recording(&snapshot));
                    }
                }

                true = biometric_updates.changed() => {
                    let snapshot = biometric_updates.current();
                    let headline = biometric_headline(&snapshot);
                    if headline != biometric_shown {
                        biometric_shown = headline;
                        println!("{}", describe_biometric(&snapshot));
                    }
                }

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = ?e, "Controller task failed");
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Savitri shut down successfully");

        Ok(())
    }

    async fn shutdown(&mut self) {
        self.biometric.stop_authentication().await;
        self.tasks.shutdown().await;
        self.recording.dispose().await;
    }

    fn answer(&self, approved: bool) {
        if !self.authenticator.answer(approved) {
            println!("no challenge is waiting");
        }
    }

    fn spawn<F>(&mut self, operation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(operation);
    }

    #[instrument(skip(self))]
    fn dispatch(&mut self, command: AppCommand) {
        let recording = Arc::clone(&self.recording);
        let biometric = Arc::clone(&self.biometric);

        match command {
            AppCommand::Start => self.spawn(async move {
                if !recording.start_recording().await {
                    println!("could not start recording");
                }
            }),
            AppCommand::Pause => self.spawn(async move {
                if !recording.pause_recording().await {
                    println!("nothing to pause");
                }
            }),
            AppCommand::Resume => self.spawn(async move {
                if !recording.resume_recording().await {
                    println!("nothing to resume");
                }
            }),
            AppCommand::Stop => self.spawn(async move {
                match recording.stop_recording().await {
                    Some(path) => println!("saved {}", path.display()),
                    None => println!("nothing saved"),
                }
            }),
            AppCommand::Duration => {
                println!("{:.1}s", self.recording.recording_duration().as_secs_f64());
            }
            AppCommand::Status => {
                println!("{}", describe_recording(&self.recording.snapshot()));
                println!("{}", describe_biometric(&self.biometric.snapshot()));
            }
            AppCommand::BioCheck => self.spawn(async move {
                let available = biometric.check_biometric_availability().await;
                println!("biometrics available: {available}");
            }),
            AppCommand::BioEnable => self.spawn(async move {
                let enabled = biometric.enable_biometric().await;
                println!("enable biometric login: {}", verdict(enabled));
            }),
            AppCommand::BioEnroll => self.spawn(async move {
                let enrolled = biometric.enroll_biometric().await;
                println!("biometric setup: {}", verdict(enrolled));
            }),
            AppCommand::BioDisable => self.spawn(async move {
                let disabled = biometric.disable_biometric().await;
                println!("disable biometric login: {}", verdict(disabled));
            }),
            AppCommand::BioAuth { reason } => self.spawn(async move {
                let passed = biometric.authenticate(&reason).await;
                println!("authentication: {}", if passed { "passed" } else { "not passed" });
            }),
            AppCommand::BioCancel => self.spawn(async move {
                biometric.stop_authentication().await;
            }),
            AppCommand::BioClear => self.spawn(async move {
                biometric.clear_biometric_data().await;
                println!("biometric data cleared");
            }),
            AppCommand::Approve => self.answer(true),
            AppCommand::Deny => self.answer(false),
            AppCommand::Help => println!("{HELP}"),
            AppCommand::Quit => {}
        }
    }
}

fn verdict(ok: bool) -> &'static str {
    if ok { "done" } else { "refused" }
}
