use std::io::{BufRead, Write};

use crate::core::error::{AppError, AppResult};
use crate::core::models::InstanceRecord;

/// Show the candidates and read indexes from `input` until one is in range.
///
/// Bad or out-of-range input re-prompts. Running out of input is an error,
/// since there is nobody left to ask.
pub fn choose_instance<R, W>(
    records: &[InstanceRecord],
    input: &mut R,
    output: &mut W,
) -> AppResult<usize>
where
    R: BufRead,
    W: Write,
{
    let last = records
        .len()
        .checked_sub(1)
        .ok_or_else(|| AppError::Input("no instances to choose from".to_string()))?;

    writeln!(output, "{:>5} | {}", "index", "service name @ machine")?;
    for (i, record) in records.iter().enumerate() {
        writeln!(output, "[{}] {}", i, record)?;
    }

    loop {
        writeln!(output, "please use the index to choose.")?;
        output.flush()?;

        let mut raw = Vec::new();
        if input.read_until(b'\n', &mut raw)? == 0 {
            return Err(AppError::Input(
                "input closed before an instance was chosen".to_string(),
            ));
        }
        let line = String::from_utf8_lossy(&raw);

        match line.trim().parse::<usize>() {
            Ok(idx) if idx <= last => return Ok(idx),
            Ok(_) => writeln!(output, "wrong index range, [0-{}] is valid", last)?,
            Err(e) => writeln!(output, "wrong input! {:?}: {}", line.trim(), e)?,
        }
    }
}
