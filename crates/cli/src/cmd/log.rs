//! Print commit history

use crate::util::{self, Paths};
use anyhow::Result;

pub fn run(paths: &Paths) -> Result<()> {
    let manager = util::open_manager(paths)?;
    for line in manager.retrieve_history()? {
        println!("{}", line);
    }
    Ok(())
}
