use clap::Subcommand;
use questdeck_core::Category;

use crate::context;

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Print the stored snapshot without rotating it
    Show {
        /// User ID
        user_id: String,
        /// Category: daily or weekly
        category: Category,
    },
    /// List stored snapshot keys
    List,
}

pub fn run(action: SnapshotAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context::open()?;
    let cache = ctx.service.cache();

    match action {
        SnapshotAction::Show { user_id, category } => match cache.load(&user_id, category)? {
            Some(selection) => {
                let target = ctx.config.rotation.target_count(category);
                println!("{}", serde_json::to_string_pretty(&selection)?);
                if selection.items.len() < target {
                    eprintln!("{} of {target} slots filled", selection.items.len());
                }
            }
            None => println!("No {category} snapshot for {user_id}"),
        },
        SnapshotAction::List => {
            for key in cache.keys()? {
                println!("{key}");
            }
        }
    }
    Ok(())
}
