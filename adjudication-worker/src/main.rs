//! Adjudication Worker
//!
//! Runs one adjudication job against a registry snapshot and writes the
//! snapshot back.
//!
//! ## Usage
//!
//! ```bash
//! # Materialize tickets for every individual flagged for adjudication
//! adjudication-worker --snapshot registry.json materialize --business-area afghanistan
//!
//! # Materialize for named candidates of one import batch
//! adjudication-worker --snapshot registry.json materialize \
//!     --business-area afghanistan --import-batch rdi-7 --candidates ind-1,ind-2
//!
//! # Close a ticket
//! adjudication-worker --snapshot registry.json close --ticket <id> --actor officer@unicef.org
//!
//! # List households eligible under targeting flags
//! adjudication-worker --snapshot registry.json targeting \
//!     --flag flag_exclude_if_active_adjudication_ticket
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use adjudication::targeting::flag_filter;
use adjudication::{AdjudicationConfig, AdjudicationService, HouseholdFilter, MaterializeRequest, TicketScope};
use registry::{
    GoldenRecordStatus, IndividualId, Registry, RegistryRead, RegistryState, TicketId,
    POSSIBLE_DUPLICATES_KEY,
};

#[derive(Parser, Debug)]
#[command(name = "adjudication-worker")]
#[command(about = "Runs needs-adjudication jobs against a registry snapshot")]
struct Args {
    /// Path to YAML config file
    #[arg(short, long, env = "ADJUDICATION_CONFIG")]
    config: Option<PathBuf>,

    /// Registry snapshot (JSON)
    #[arg(short, long, env = "ADJUDICATION_SNAPSHOT")]
    snapshot: PathBuf,

    /// Run the job without writing the snapshot back
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create needs-adjudication tickets from golden-record matches
    Materialize {
        /// Match set to read hits from
        #[arg(long, default_value = POSSIBLE_DUPLICATES_KEY)]
        results_key: String,

        /// Business area stamped on created tickets
        #[arg(long, env = "ADJUDICATION_BUSINESS_AREA")]
        business_area: String,

        /// Programme stamped on created tickets
        #[arg(long)]
        program: Option<String>,

        /// Import batch that produced the matches
        #[arg(long)]
        import_batch: Option<String>,

        /// Candidate individuals; defaults to everyone flagged for adjudication
        #[arg(long, value_delimiter = ',')]
        candidates: Vec<String>,
    },

    /// Close a ticket and apply its decision
    Close {
        #[arg(long)]
        ticket: String,

        /// Recorded as the closing officer
        #[arg(long, env = "ADJUDICATION_ACTOR", default_value = "adjudication-worker")]
        actor: String,
    },

    /// List households passing the given exclusion flags
    Targeting {
        #[arg(long = "flag")]
        flags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AdjudicationConfig::load(path)?,
        None => AdjudicationConfig::default(),
    };

    let level = &config.general.log_level;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "adjudication={level},adjudication_worker={level},registry={level}"
            ))
        }))
        .init();

    let state = RegistryState::load(&args.snapshot)
        .with_context(|| format!("cannot load snapshot {}", args.snapshot.display()))?;
    let service = AdjudicationService::new(Registry::from_state(state), config);

    let report = match args.command {
        Command::Materialize {
            results_key,
            business_area,
            program,
            import_batch,
            candidates,
        } => {
            let candidates: Vec<IndividualId> = if candidates.is_empty() {
                flagged_individuals(&service, &business_area).await
            } else {
                candidates.into_iter().map(IndividualId::from).collect()
            };

            let mut scope = TicketScope::business_area(business_area);
            if let Some(program) = program {
                scope = scope.with_program(program);
            }
            let mut request = MaterializeRequest::new(results_key, scope);
            if let Some(batch) = import_batch {
                request = request.with_import_batch(batch);
            }

            info!(candidates = candidates.len(), "Materializing needs adjudication tickets");
            match service.create_needs_adjudication_tickets(&candidates, &request).await? {
                None => serde_json::json!({ "processed": false, "tickets": [] }),
                Some(tickets) => serde_json::json!({
                    "processed": true,
                    "tickets": tickets
                        .iter()
                        .map(|ticket| serde_json::json!({ "id": ticket.id, "unicef_id": ticket.unicef_id }))
                        .collect::<Vec<_>>(),
                }),
            }
        }

        Command::Close { ticket, actor } => {
            let ticket_id = TicketId::from(ticket);
            match service.close_ticket(&ticket_id, &actor).await? {
                None => serde_json::json!({ "ticket": ticket_id, "closed": false }),
                Some(outcome) => serde_json::json!({
                    "ticket": ticket_id,
                    "closed": true,
                    "survivor": outcome.survivor,
                    "duplicates": outcome.duplicates,
                    "cleared": outcome.cleared,
                    "withdrawn_households": outcome.withdrawn_households,
                    "updated_siblings": outcome.updated_siblings,
                }),
            }
        }

        Command::Targeting { flags } => {
            let mut filter = HouseholdFilter::All;
            for flag in &flags {
                filter = filter.and(flag_filter(flag, true)?);
            }
            let households = service.eligible_households(&filter).await;
            serde_json::json!({ "flags": flags, "households": households })
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.dry_run {
        info!("Dry run, snapshot left unchanged");
        return Ok(());
    }

    service
        .registry()
        .snapshot()
        .await
        .save(&args.snapshot)
        .with_context(|| format!("cannot write snapshot {}", args.snapshot.display()))?;
    info!(path = %args.snapshot.display(), "Snapshot saved");
    Ok(())
}

/// Individuals of a business area flagged for adjudication.
async fn flagged_individuals(service: &AdjudicationService, business_area: &str) -> Vec<IndividualId> {
    service
        .registry()
        .read(|state| {
            state
                .individuals()
                .filter(|individual| individual.business_area == business_area)
                .filter(|individual| {
                    individual.deduplication_golden_record_status == GoldenRecordStatus::NeedsAdjudication
                })
                .filter(|individual| individual.is_active())
                .map(|individual| individual.id.clone())
                .collect()
        })
        .await
}
