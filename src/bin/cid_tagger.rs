use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use mailparse::MailAddr;
use std::path::PathBuf;

use cid_tagger::Config;
use cid_tagger::auth::AuthSession;
use cid_tagger::config::{load_config, load_config_from};
use cid_tagger::directory::Environment;
use cid_tagger::domain::EmailAddressDetails;
use cid_tagger::events::{ActionRegistry, Disposition, Orchestrator, Trigger};
use cid_tagger::host::draft::{DraftMessage, RecordedEvent};
use cid_tagger::taskpane::state::{AppState, RegisterLinks};
use cid_tagger::taskpane::{self, APP_VERSION, StatusKind, Taskpane, run_taskpane};

#[derive(Parser)]
#[command(name = "cid_tagger")]
#[command(about = "Tag outgoing mail subjects with Client IDs from the CID Register", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/cid_tagger/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local development: use the built-in static directory
    #[arg(long, global = true)]
    dev: bool,

    /// No host message context: use the built-in static directory
    #[arg(long, global = true)]
    detached: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum TriggerArg {
    Compose,
    RecipientsChanged,
    Send,
}

impl From<TriggerArg> for Trigger {
    fn from(t: TriggerArg) -> Self {
        match t {
            TriggerArg::Compose => Trigger::Compose,
            TriggerArg::RecipientsChanged => Trigger::RecipientsChanged,
            TriggerArg::Send => Trigger::Send,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run one host event against a draft built from the arguments
    Check {
        #[arg(long, value_enum, default_value_t = TriggerArg::Send)]
        trigger: TriggerArg,

        /// Recipients, e.g. "Jen <jen@example.com>, ops@example.com"
        #[arg(long)]
        to: Vec<String>,

        #[arg(long)]
        cc: Vec<String>,

        /// Omit to simulate a host that does not expose BCC
        #[arg(long)]
        bcc: Vec<String>,

        #[arg(long, default_value = "")]
        subject: String,
    },

    /// Look up the CID for one address
    Lookup { email: String },

    /// Interactive task pane
    Taskpane {
        #[arg(long)]
        to: Vec<String>,

        #[arg(long)]
        cc: Vec<String>,

        #[arg(long, default_value = "")]
        subject: String,
    },

    /// Open the CID Register list in the browser
    OpenRegister,

    /// Open the CID Register new-item form in the browser
    AddToRegister,

    /// Forget the stored Microsoft 365 sign-in
    SignOut,
}

fn parse_recipients(values: &[String]) -> Result<Vec<EmailAddressDetails>> {
    let mut out = Vec::new();
    for v in values {
        let list = mailparse::addrparse(v).map_err(|e| anyhow!("invalid address list '{v}': {e}"))?;
        for addr in list.iter() {
            match addr {
                MailAddr::Single(info) => out.push(EmailAddressDetails::new(
                    info.addr.clone(),
                    info.display_name.clone().unwrap_or_default(),
                )),
                MailAddr::Group(group) => {
                    for info in &group.addrs {
                        out.push(EmailAddressDetails::new(
                            info.addr.clone(),
                            info.display_name.clone().unwrap_or_default(),
                        ));
                    }
                }
            }
        }
    }
    Ok(out)
}

fn build_draft(to: &[String], cc: &[String], bcc: &[String], subject: &str) -> Result<DraftMessage> {
    let mut draft = DraftMessage::new(subject)
        .with_to(parse_recipients(to)?)
        .with_cc(parse_recipients(cc)?);
    if !bcc.is_empty() {
        draft = draft.with_bcc(parse_recipients(bcc)?);
    }
    Ok(draft)
}

fn build_orchestrator(cfg: &Config, env: &Environment) -> Result<Orchestrator> {
    Orchestrator::from_config(cfg, env, || Box::new(AuthSession::from_config(cfg, true)))
        .map_err(|e| anyhow!("Configuration error: {e}"))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(|e| anyhow!("Configuration error: {e}"))?;

    let env = Environment {
        local_development: cli.dev,
        host_context: !cli.detached,
    };

    match cli.cmd {
        Command::Check {
            trigger,
            to,
            cc,
            bcc,
            subject,
        } => {
            let orchestrator = build_orchestrator(&cfg, &env)?;
            let draft = build_draft(&to, &cc, &bcc, &subject)?;
            let recorder = RecordedEvent::new();

            let trigger = Trigger::from(trigger);
            let disposition = ActionRegistry::standard()
                .dispatch(&orchestrator, trigger.action_id(), &draft, recorder.event())
                .ok_or_else(|| anyhow!("no handler for {trigger}"))?;

            for (key, notice) in draft.notices() {
                println!("notice [{key}]: {}", notice.message);
            }
            println!("subject: {}", draft.subject());
            println!("result: {disposition:?}");

            if let Some(Some(options)) = recorder.only_completion()
                && options.allow_event == Some(false)
            {
                eprintln!(
                    "Send blocked: {}",
                    options.error_message.unwrap_or_default()
                );
                std::process::exit(2);
            }
            if let Disposition::Failed(e) = disposition {
                eprintln!("Lookup failed (ignored on {trigger}): {e}");
            }
            Ok(())
        }

        Command::Lookup { email } => {
            let orchestrator = build_orchestrator(&cfg, &env)?;
            let pane = Taskpane::new(orchestrator.resolver(), orchestrator.tagger(), env.host_context);
            let status = pane.lookup(&email);
            println!("{}", status.message);
            if status.kind == StatusKind::Error {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::Taskpane { to, cc, subject } => {
            let orchestrator = build_orchestrator(&cfg, &env)?;
            let pane = Taskpane::new(orchestrator.resolver(), orchestrator.tagger(), env.host_context);
            let draft = if env.host_context {
                Some(build_draft(&to, &cc, &[], &subject)?)
            } else {
                None
            };
            let links = RegisterLinks {
                list_url: cfg.register_list_url(),
                new_item_url: cfg.register_new_item_url(),
            };
            let debug_info = format!(
                "cid_tagger v{APP_VERSION} | directory: {:?} | host: {}",
                orchestrator.resolver().mode(),
                if env.host_context { "draft" } else { "none" }
            );
            run_taskpane(AppState::new(draft, links, debug_info), &pane)
                .map_err(|e| anyhow!("{e:?}"))
        }

        Command::OpenRegister => {
            taskpane::open_external(&cfg.register_list_url())?;
            Ok(())
        }

        Command::AddToRegister => {
            taskpane::open_external(&cfg.register_new_item_url())?;
            Ok(())
        }

        Command::SignOut => {
            AuthSession::from_config(&cfg, false).sign_out()?;
            println!("Signed out");
            Ok(())
        }
    }
}
