#![no_main]

use energy_demand::output::SinkOutput;
use energy_demand::run_scenario;
use libfuzzer_sys::fuzz_target;
use std::io::{BufReader, Cursor};

fuzz_target!(|data: &[u8]| {
    let _run = run_scenario(BufReader::new(Cursor::new(data)), SinkOutput, false);
});
