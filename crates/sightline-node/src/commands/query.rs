//! `sightline query`: one-shot reads through a client session
//!
//! Sightings print as `type,id,timestamp,camera,latitude,longitude`.

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat};
use clap::{Args, Subcommand, ValueEnum};

use sightline_core::{ObjectType, ObservableId, ObservationDto};

use crate::commands::open_session;
use crate::config::NodeConfig;

/// Query command options
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Replica to address; any published replica when unset
    #[arg(short, long)]
    pub replica: Option<u32>,

    #[command(subcommand)]
    pub action: QueryAction,
}

/// Kind of tracked object
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Kind {
    /// Person, identified by a number
    Person,
    /// Car, identified by its plate
    Car,
}

impl From<Kind> for ObjectType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Person => ObjectType::Person,
            Kind::Car => ObjectType::Car,
        }
    }
}

/// Read operations
#[derive(Subcommand, Debug)]
pub enum QueryAction {
    /// Show a camera's location
    CamInfo {
        /// Camera name
        name: String,
    },
    /// Latest sighting of one object
    Track {
        /// Object kind
        kind: Kind,
        /// Person number or car plate
        id: String,
    },
    /// Latest sighting of every object whose id matches a `*` pattern
    TrackMatch {
        /// Object kind
        kind: Kind,
        /// Id pattern, e.g. `10*`
        pattern: String,
    },
    /// Every sighting of one object, newest first
    Trace {
        /// Object kind
        kind: Kind,
        /// Person number or car plate
        id: String,
    },
}

fn parse_id(kind: Kind, raw: &str) -> Result<ObservableId> {
    match kind {
        Kind::Person => match raw.parse::<u64>() {
            Ok(n) => Ok(ObservableId::Person(n)),
            Err(_) => bail!("'{raw}' is not a person number"),
        },
        Kind::Car => Ok(ObservableId::Car(raw.to_string())),
    }
}

fn format_sighting(observation: &ObservationDto) -> String {
    let id = match &observation.id {
        ObservableId::Person(n) => n.to_string(),
        ObservableId::Car(plate) => plate.clone(),
    };
    let kind = match observation.object_type {
        ObjectType::Person => "person",
        ObjectType::Car => "car",
        ObjectType::Unspecified => "unspecified",
    };
    let timestamp = DateTime::from_timestamp(observation.timestamp_secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| observation.timestamp_secs.to_string());
    format!(
        "{kind},{id},{timestamp},{},{},{}",
        observation.camera.name, observation.camera.latitude, observation.camera.longitude
    )
}

/// Run a read operation and print the answer
pub async fn handle_query_command(cmd: QueryCommand, config: &NodeConfig) -> Result<()> {
    let mut session = open_session(config, cmd.replica).await?;
    match cmd.action {
        QueryAction::CamInfo { name } => {
            let camera = session.cam_info(&name).await?;
            println!("{},{}", camera.latitude, camera.longitude);
        }
        QueryAction::Track { kind, id } => {
            if let Some(observation) = session.track(kind.into(), parse_id(kind, &id)?).await? {
                println!("{}", format_sighting(&observation));
            }
        }
        QueryAction::TrackMatch { kind, pattern } => {
            for observation in session.track_match(kind.into(), &pattern).await? {
                println!("{}", format_sighting(&observation));
            }
        }
        QueryAction::Trace { kind, id } => {
            for observation in session.trace(kind.into(), parse_id(kind, &id)?).await? {
                println!("{}", format_sighting(&observation));
            }
        }
    }
    Ok(())
}
