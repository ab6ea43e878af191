use crate::cmd::DecodeArgs;
use crate::config::Settings;
use crate::exit::{CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decoded, OutputFormat};

/// Decode one payload offline. Exits with `DATA_INVALID` when any field was
/// rejected, after printing what did decode.
pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let settings = Settings::from_file(&args.config)?;
    let registry = settings.registry()?;

    let decoded = registry.decode(args.payload.as_bytes());
    print_decoded(&decoded, format);

    if decoded.errors.is_empty() {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}
