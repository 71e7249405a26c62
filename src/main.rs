use std::fs;

use anyhow::{bail, Context, Result};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let [_, input_path, output_path] = args.as_slice() else {
        bail!("Usage: mython <file_in> <file_out>");
    };

    let source =
        fs::read_to_string(input_path).with_context(|| format!("Reading {input_path}"))?;
    let mut output =
        fs::File::create(output_path).with_context(|| format!("Creating {output_path}"))?;

    mython::interpret(&source, &mut output)
}
