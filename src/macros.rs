macro_rules! emit {
    ($context:expr, $opcode:expr) => {
        writeln!($context.output, "\t{}", $opcode)
    };

    ($context:expr, $opcode:expr, $($format:tt)*) => {{
        write!($context.output, "\t{:8}", $opcode)?;
        writeln!($context.output, $($format)*)
    }};
}

macro_rules! label {
    ($context:expr, $label:expr) => {
        writeln!($context.output, "{}:", $label)
    };
}
