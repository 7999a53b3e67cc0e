use clap::Args;
use dataset::codec;
use dataset::encoding::planes::{BLACK_MOVES, TURN, WHITE_MOVES};
use dataset::encoding::{self_check as run_self_check, Encoding};
use dataset::{Scheme, Tensor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};
use std::error::Error;

#[derive(Args)]
pub struct SelfCheckCommand {
    /// Encoding scheme: planes or flat
    #[arg(long, value_name = "scheme", default_value = "planes")]
    scheme: Scheme,

    /// If provided, it will print the encoding of the given FEN
    #[arg(long, value_name = "fen")]
    fen: Option<String>,
}

pub fn self_check(cmd: SelfCheckCommand) -> Result<(), Box<dyn Error>> {
    run_self_check(&cmd.scheme)?;
    println!(
        "{}: shape {:?}, {} elements, {} bytes packed: ok",
        cmd.scheme,
        cmd.scheme.shape(),
        cmd.scheme.num_elements(),
        cmd.scheme.packed_len()
    );

    if let Some(fen) = cmd.fen {
        let position: Chess = Fen::from_ascii(fen.as_bytes())?.into_position(CastlingMode::Standard)?;
        let tensor = cmd.scheme.encode(&position)?;

        match tensor.shape() {
            [_, 8, 8] => print_planes(&tensor),
            _ => print_active(&tensor),
        }

        let packed = codec::pack(&tensor)?;
        println!(
            "packed: {}",
            packed.iter().map(|byte| format!("{:02x}", byte)).collect::<String>()
        );
    }

    Ok(())
}

fn plane_name(plane: usize) -> String {
    const PIECES: &[u8] = b"PNBRQKpnbrqk";

    match plane {
        WHITE_MOVES => "white moves".to_string(),
        BLACK_MOVES => "black moves".to_string(),
        TURN => "white to move".to_string(),
        _ => format!("{}", PIECES[plane] as char),
    }
}

fn print_planes(tensor: &Tensor) {
    for plane in 0..tensor.shape()[0] {
        println!("plane {} ({})", plane, plane_name(plane));
        for row in 0..8 {
            let line: String = (0..8)
                .map(|column| {
                    if tensor.get(&[plane, row, column]) == 1 {
                        'x'
                    } else {
                        '.'
                    }
                })
                .collect();
            println!("  {}", line);
        }
    }
}

fn print_active(tensor: &Tensor) {
    let active: Vec<String> = tensor
        .as_slice()
        .iter()
        .enumerate()
        .filter(|(_, &value)| value == 1)
        .map(|(index, _)| index.to_string())
        .collect();

    println!("active: {}", active.join(" "));
}
