//! `folio actions`: split a raw answer into prose and directives.

use folio_actions::SurfaceMessage;
use std::io::Read;

pub fn run(speakable: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;

    let extraction = folio_actions::extract(&raw);

    if speakable {
        println!("{}", extraction.speakable());
        return Ok(());
    }

    println!("{}\n", extraction.prose);
    let message = SurfaceMessage::actions(&extraction.directives);
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
