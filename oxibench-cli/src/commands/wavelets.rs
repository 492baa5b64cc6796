//! Wavelets command implementation.

use oxibench_dwt::WaveletFamily;

pub fn cmd_wavelets() -> Result<(), Box<dyn std::error::Error>> {
    println!("{:<10} {:>6} {:>14}  Depth at 512px", "Name", "Taps", "Kind");
    println!("{}", "-".repeat(48));

    for family in WaveletFamily::ALL {
        let kind = if family.is_orthogonal() {
            "orthogonal"
        } else {
            "biorthogonal"
        };
        println!(
            "{:<10} {:>6} {:>14}  {}",
            family.name(),
            family.filter_len(),
            kind,
            family.max_level(512)
        );
    }
    Ok(())
}
