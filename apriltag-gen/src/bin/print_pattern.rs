// Debug tool: print the cell grid of one or more tags
use anyhow::Result;
use apriltag_gen::tag36h11::{self, BIT_X, BIT_Y};
use apriltag_gen::TagFamily;
use clap::Parser;

/// Print tag36h11 patterns as text
#[derive(Parser, Debug)]
#[command(name = "print-pattern")]
struct Args {
    /// Tag ids to print
    #[arg(required = true)]
    ids: Vec<u32>,

    /// Also print which codeword bit drives each data cell
    #[arg(long)]
    bits: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let family = TagFamily::Tag36h11;
    println!("Family: tag{} ({} codes, min Hamming distance {})\n", family, family.len(), family.min_hamming());

    for id in args.ids {
        let pattern = tag36h11::lookup(id)?;
        let codeword = tag36h11::codeword(id)?;

        println!("Tag ID: {}", id);
        println!("Codeword: 0x{:09x}", codeword);
        println!("{}", pattern);
    }

    if args.bits {
        // 6x6 data area, bit 0 is the most significant codeword bit
        let mut grid = [[0usize; 6]; 6];
        for i in 0..36 {
            grid[BIT_Y[i] as usize - 1][BIT_X[i] as usize - 1] = i;
        }
        println!("Bit position mapping:");
        for row in grid {
            for bit in row {
                print!("{:2} ", bit);
            }
            println!();
        }
    }

    Ok(())
}
