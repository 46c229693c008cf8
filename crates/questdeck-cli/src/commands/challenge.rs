//! Catalog management and administrator edit/delete commands.

use chrono::Utc;
use clap::Subcommand;
use questdeck_core::{Catalog, Category, Challenge, ChallengePatch};
use uuid::Uuid;

use crate::context;

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Add a challenge to the catalog
    Add {
        /// Challenge title
        title: String,
        /// Category: daily or weekly
        #[arg(long, default_value = "daily")]
        category: Category,
        /// Body text
        #[arg(long, default_value = "")]
        text: String,
        /// Presenting character
        #[arg(long, default_value = "")]
        character: String,
        /// Allow a drawing as the answer
        #[arg(long)]
        allows_drawing: bool,
    },
    /// List catalog challenges
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Show a single challenge
    Show {
        /// Challenge ID
        id: String,
    },
    /// Edit a challenge and propagate to every user's snapshot (admin only)
    Edit {
        /// Acting administrator
        actor: String,
        /// Challenge ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        character: Option<String>,
        #[arg(long)]
        allows_drawing: Option<bool>,
    },
    /// Delete a challenge and replace it in every user's snapshot (admin only)
    Delete {
        /// Acting administrator
        actor: String,
        /// Challenge ID
        id: String,
    },
}

pub fn run(action: ChallengeAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context::open()?;

    match action {
        ChallengeAction::Add {
            title,
            category,
            text,
            character,
            allows_drawing,
        } => {
            let challenge = Challenge {
                id: Uuid::new_v4().to_string(),
                title,
                text,
                category,
                character,
                allows_drawing,
                created_at: Utc::now(),
            };
            ctx.catalog.insert_challenge(&challenge)?;
            println!("{}", serde_json::to_string_pretty(&challenge)?);
        }
        ChallengeAction::List { category } => {
            let challenges = match category {
                Some(category) => ctx.catalog.list_by_category(category)?,
                None => ctx.catalog.list_challenges()?,
            };
            println!("{}", serde_json::to_string_pretty(&challenges)?);
        }
        ChallengeAction::Show { id } => match ctx.catalog.get_challenge(&id)? {
            Some(challenge) => println!("{}", serde_json::to_string_pretty(&challenge)?),
            None => return Err(format!("challenge not found: {id}").into()),
        },
        ChallengeAction::Edit {
            actor,
            id,
            title,
            text,
            category,
            character,
            allows_drawing,
        } => {
            let patch = ChallengePatch {
                title,
                text,
                category,
                character,
                allows_drawing,
            };
            let runtime = tokio::runtime::Runtime::new()?;
            let report = runtime.block_on(ctx.service.admin_edit_challenge(&actor, &id, patch))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ChallengeAction::Delete { actor, id } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let report = runtime.block_on(ctx.service.admin_delete_challenge(&actor, &id))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
