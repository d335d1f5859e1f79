use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use ccdpipe_core::frame::Observation;
use ccdpipe_core::io::FitsReader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = FitsReader::open(&args.file)?;
    let layout = &reader.layout;

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}", layout.width, layout.height);
    println!("BITPIX:      {}", layout.bitpix);
    if layout.bscale != 1.0 || layout.bzero != 0.0 {
        println!("Scaling:     {} * raw + {}", layout.bscale, layout.bzero);
    }
    let data_mb = layout.data_byte_size() as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", data_mb);

    match Observation::from_header(&reader.header, &args.file) {
        Ok(obs) => {
            println!("Object:      {}", obs.object);
            println!("Filter:      {}", obs.filter);
            println!("Exposure:    {} s", obs.exposure);
            println!("Airmass:     {}", obs.airmass);
            println!("Kind:        {}", obs.kind());
        }
        Err(e) => println!("Observation: {}", e),
    }

    println!();
    for card in reader.header.cards() {
        match (&card.value, &card.comment) {
            (Some(v), Some(c)) => println!("{:<8} = {} / {}", card.keyword, v, c),
            (Some(v), None) => println!("{:<8} = {}", card.keyword, v),
            (None, Some(text)) => println!("{:<8} {}", card.keyword, text.trim()),
            (None, None) => println!("{}", card.keyword),
        }
    }

    Ok(())
}
