use pfe_torrent_core::ContentHash;

use crate::cli::HashCommand;
use crate::error::{CliError, CliResult};

pub(crate) fn handle_hash(command: &HashCommand) -> CliResult<()> {
    println!("{}", convert(command)?);
    Ok(())
}

pub(crate) fn convert(command: &HashCommand) -> CliResult<String> {
    match command {
        HashCommand::ToHex(args) => ContentHash::from_base32(&args.value)
            .map(|hash| hash.to_hex())
            .map_err(|err| CliError::validation(format!("invalid base32 hash: {err}"))),
        HashCommand::ToBase32(args) => ContentHash::from_hex(&args.value)
            .map(|hash| hash.to_base32())
            .map_err(|err| CliError::validation(format!("invalid hex hash: {err}"))),
    }
}
