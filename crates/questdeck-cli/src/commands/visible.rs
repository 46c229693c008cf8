use clap::Args;
use questdeck_core::Category;

use crate::context;

#[derive(Args)]
pub struct VisibleArgs {
    /// User ID
    pub user_id: String,
    /// Category: daily or weekly
    pub category: Category,
    /// Print JSON instead of a list
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: VisibleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context::open()?;
    let challenges = ctx.service.get_visible_challenges(&args.user_id, args.category);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&challenges)?);
    } else if challenges.is_empty() {
        println!("No {} challenges left", args.category);
    } else {
        for challenge in &challenges {
            println!("[{}] {}", challenge.id, challenge.title);
        }
    }
    Ok(())
}
