use clap::Subcommand;
use questdeck_core::CatalogDb;

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a user
    Add {
        /// User ID
        id: String,
        /// Grant the administrator capability
        #[arg(long)]
        admin: bool,
    },
    /// List registered users
    List,
}

pub fn run(action: UserAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = CatalogDb::open()?;

    match action {
        UserAction::Add { id, admin } => {
            db.add_user(&id, admin)?;
            println!("User added: {id}");
        }
        UserAction::List => {
            let users = db.list_users()?;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
    }
    Ok(())
}
