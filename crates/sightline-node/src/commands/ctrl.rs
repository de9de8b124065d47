//! `sightline ctrl`: control operations on a replica

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::commands::open_session;
use crate::config::NodeConfig;

/// Control command options
#[derive(Args, Debug)]
pub struct CtrlCommand {
    /// Replica to address; any published replica when unset
    #[arg(short, long)]
    pub replica: Option<u32>,

    #[command(subcommand)]
    pub action: CtrlAction,
}

/// Control operations
#[derive(Subcommand, Debug)]
pub enum CtrlAction {
    /// Check that the replica answers
    Ping {
        /// Name to be greeted with
        #[arg(default_value = "operator")]
        name: String,
    },
    /// Wipe the replica's store and update logs
    Clear,
    /// Wipe the replica and load the demo dataset
    Init,
}

/// Run a control operation
pub async fn handle_ctrl_command(cmd: CtrlCommand, config: &NodeConfig) -> Result<()> {
    let mut session = open_session(config, cmd.replica).await?;
    match cmd.action {
        CtrlAction::Ping { name } => {
            println!("{}", session.ctrl_ping(&name).await?);
        }
        CtrlAction::Clear => {
            session.ctrl_clear().await?;
            println!("{} cleared", session.bound_path());
        }
        CtrlAction::Init => {
            session.ctrl_init().await?;
            println!("{} loaded the demo dataset", session.bound_path());
        }
    }
    Ok(())
}
