//! SM83 disassembly for divergence reports.

const R8: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const R16: [&str; 4] = ["BC", "DE", "HL", "SP"];
const R16_STACK: [&str; 4] = ["BC", "DE", "HL", "AF"];
const R16_MEM: [&str; 4] = ["(BC)", "(DE)", "(HL+)", "(HL-)"];
const CC: [&str; 4] = ["NZ", "Z", "NC", "C"];
const ALU: [&str; 8] = ["ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];
const ROT_A: [&str; 8] = ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"];

/// Renders the first instruction in `bytes`. Missing operand bytes read as
/// zero, matching the zero-padded instruction window.
pub fn disassemble(bytes: &[u8]) -> String {
    let byte = |i: usize| bytes.get(i).copied().unwrap_or(0);
    let d8 = byte(1);
    let d16 = u16::from_le_bytes([byte(1), byte(2)]);
    let e8 = d8 as i8;

    let op = byte(0);
    let x = op >> 6;
    let y = usize::from((op >> 3) & 7);
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1 == 1;

    match (x, z) {
        (0, 0) => match y {
            0 => "NOP".to_string(),
            1 => format!("LD (${d16:04X}),SP"),
            2 => "STOP".to_string(),
            3 => format!("JR {e8:+}"),
            _ => format!("JR {},{e8:+}", CC[y - 4]),
        },
        (0, 1) if q => format!("ADD HL,{}", R16[p]),
        (0, 1) => format!("LD {},${d16:04X}", R16[p]),
        (0, 2) if q => format!("LD A,{}", R16_MEM[p]),
        (0, 2) => format!("LD {},A", R16_MEM[p]),
        (0, 3) => format!("{} {}", if q { "DEC" } else { "INC" }, R16[p]),
        (0, 4) => format!("INC {}", R8[y]),
        (0, 5) => format!("DEC {}", R8[y]),
        (0, 6) => format!("LD {},${d8:02X}", R8[y]),
        (0, _) => ROT_A[y].to_string(),
        (1, 6) if y == 6 => "HALT".to_string(),
        (1, _) => format!("LD {},{}", R8[y], R8[usize::from(z)]),
        (2, _) => format!("{}{}", ALU[y], R8[usize::from(z)]),
        (_, 0) => match y {
            0..=3 => format!("RET {}", CC[y]),
            4 => format!("LDH (${d8:02X}),A"),
            5 => format!("ADD SP,{e8:+}"),
            6 => format!("LDH A,(${d8:02X})"),
            _ => format!("LD HL,SP{e8:+}"),
        },
        (_, 1) if q => match p {
            0 => "RET".to_string(),
            1 => "RETI".to_string(),
            2 => "JP HL".to_string(),
            _ => "LD SP,HL".to_string(),
        },
        (_, 1) => format!("POP {}", R16_STACK[p]),
        (_, 2) => match y {
            0..=3 => format!("JP {},${d16:04X}", CC[y]),
            4 => "LD (C),A".to_string(),
            5 => format!("LD (${d16:04X}),A"),
            6 => "LD A,(C)".to_string(),
            _ => format!("LD A,(${d16:04X})"),
        },
        (_, 3) => match y {
            0 => format!("JP ${d16:04X}"),
            1 => prefixed(d8),
            6 => "DI".to_string(),
            7 => "EI".to_string(),
            _ => illegal(op),
        },
        (_, 4) if y < 4 => format!("CALL {},${d16:04X}", CC[y]),
        (_, 5) if q && p == 0 => format!("CALL ${d16:04X}"),
        (_, 5) if !q => format!("PUSH {}", R16_STACK[p]),
        (_, 6) => format!("{}${d8:02X}", ALU[y]),
        (_, 7) => format!("RST ${:02X}", y * 8),
        _ => illegal(op),
    }
}

fn prefixed(op: u8) -> String {
    let y = usize::from((op >> 3) & 7);
    let reg = R8[usize::from(op & 7)];
    match op >> 6 {
        0 => format!("{} {reg}", ROT[y]),
        1 => format!("BIT {y},{reg}"),
        2 => format!("RES {y},{reg}"),
        _ => format!("SET {y},{reg}"),
    }
}

fn illegal(op: u8) -> String {
    format!("DB ${op:02X}")
}
