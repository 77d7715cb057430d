// ABOUTME: Spec command: print the recorded state of the environment.

use super::Context;
use devnet::error::Result;

pub fn spec(ctx: &Context) -> Result<()> {
    let spec = ctx.load_spec()?;
    println!("{}", spec.to_json()?);
    Ok(())
}
