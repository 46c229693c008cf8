use chrono::Utc;
use clap::Args;
use questdeck_core::{Catalog, CatalogDb};

#[derive(Args)]
pub struct CompleteArgs {
    /// User ID
    pub user_id: String,
    /// Challenge ID
    pub challenge_id: String,
}

pub fn run(args: CompleteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = CatalogDb::open()?;
    if db.get_challenge(&args.challenge_id)?.is_none() {
        return Err(format!("challenge not found: {}", args.challenge_id).into());
    }
    db.record_completion(&args.user_id, &args.challenge_id, Utc::now())?;
    println!("Completed: {}", args.challenge_id);
    Ok(())
}
