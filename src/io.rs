//! Initial-conditions ingest and trajectory/energy egress.
//! Grounded on `IO.hpp`'s line-based reader, generalized to accept both the
//! count-prefixed block layout and a flat one-line-per-body layout.

use std::io::Write;

use crate::{
    error::IngestError,
    vector::Vec2,
    Body,
};

/// Parses initial conditions from `text`. Accepts either layout:
/// a count-prefixed block of `mass` / `x y` / `vx vy` triples, or a flat
/// `m x y vx vy` line per body. Blank lines are ignored; unparseable lines
/// are reported to the `log` diagnostic stream and skipped. A missing count
/// header or a short record after a declared count aborts ingest.
pub fn parse_initial_conditions(text: &str) -> Result<Vec<Body>, IngestError> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Err(IngestError::MissingCount);
    }

    if let Ok(count) = lines[0].trim().parse::<usize>() {
        return parse_count_prefixed(&lines[1..], count);
    }

    Ok(parse_flat(&lines))
}

fn parse_count_prefixed(lines: &[&str], count: usize) -> Result<Vec<Body>, IngestError> {
    let mut bodies = Vec::with_capacity(count);
    let mut cursor = 0usize;
    for index in 0..count {
        if cursor + 3 > lines.len() {
            return Err(IngestError::ShortRecord {
                index,
                detail: "expected mass/position/velocity lines".into(),
            });
        }
        let mass: f64 = lines[cursor].trim().parse().map_err(|_| IngestError::ShortRecord {
            index,
            detail: format!("unparseable mass '{}'", lines[cursor]),
        })?;
        let posit = parse_pair(lines[cursor + 1]).ok_or_else(|| IngestError::ShortRecord {
            index,
            detail: format!("unparseable position '{}'", lines[cursor + 1]),
        })?;
        let vel = parse_pair(lines[cursor + 2]).ok_or_else(|| IngestError::ShortRecord {
            index,
            detail: format!("unparseable velocity '{}'", lines[cursor + 2]),
        })?;
        bodies.push(Body::new(mass, posit, vel));
        cursor += 3;
    }
    Ok(bodies)
}

fn parse_flat(lines: &[&str]) -> Vec<Body> {
    let mut bodies = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            log::warn!("skipping malformed flat-format record {i}: '{line}'");
            continue;
        }
        let parsed: Option<[f64; 5]> = (|| {
            let mut out = [0.0; 5];
            for (slot, field) in out.iter_mut().zip(fields.iter()) {
                *slot = field.parse().ok()?;
            }
            Some(out)
        })();
        match parsed {
            Some([m, x, y, vx, vy]) => {
                bodies.push(Body::new(m, Vec2::new(x, y), Vec2::new(vx, vy)));
            }
            None => log::warn!("skipping malformed flat-format record {i}: '{line}'"),
        }
    }
    bodies
}

fn parse_pair(line: &str) -> Option<Vec2> {
    let mut fields = line.split_whitespace();
    let x: f64 = fields.next()?.parse().ok()?;
    let y: f64 = fields.next()?.parse().ok()?;
    Some(Vec2::new(x, y))
}

/// Opens `path` and parses it per [`parse_initial_conditions`]. Maps a
/// failure to open into [`IngestError::Open`] and a missing count header
/// (an empty file, or a first line that parses but the block runs out
/// before `count` bodies) into the declared ingest errors.
pub fn load_initial_conditions(path: &std::path::Path) -> Result<Vec<Body>, IngestError> {
    let text = std::fs::read_to_string(path).map_err(|e| IngestError::Open(e.to_string()))?;
    parse_initial_conditions(&text)
}

/// Writes the per-step CSV trajectory header: `step,id,x0,x1`.
pub fn write_trajectory_header<W: Write>(mut out: W) -> std::io::Result<()> {
    writeln!(out, "step,id,x0,x1")
}

/// Appends one CSV row per body for trajectory `step`.
pub fn write_trajectory_frame<W: Write>(mut out: W, step: usize, bodies: &[Body]) -> std::io::Result<()> {
    for (id, b) in bodies.iter().enumerate() {
        writeln!(out, "{step},{id},{},{}", b.posit.x, b.posit.y)?;
    }
    Ok(())
}

/// Appends one "positions" text block for dumped `step`, including
/// per-body energy when present.
pub fn write_positions_frame<W: Write>(mut out: W, step: usize, bodies: &[Body]) -> std::io::Result<()> {
    writeln!(out, "# Timestep {step}")?;
    for (id, b) in bodies.iter().enumerate() {
        match b.energy {
            Some(e) => writeln!(out, "{id}\t{}\t{}\t{e}", b.posit.x, b.posit.y)?,
            None => writeln!(out, "{id}\t{}\t{}", b.posit.x, b.posit.y)?,
        }
    }
    writeln!(out)
}

/// Writes the energy log header: `# Step<TAB>TotalEnergy`.
pub fn write_energy_log_header<W: Write>(mut out: W) -> std::io::Result<()> {
    writeln!(out, "# Step\tTotalEnergy")
}

/// Appends one energy-log row.
pub fn write_energy_log_row<W: Write>(mut out: W, step: usize, total_energy: f64) -> std::io::Result<()> {
    writeln!(out, "{step}\t{total_energy}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_count_prefixed_layout() {
        let text = "2\n1.0\n0.0 0.0\n0.0 1.0\n2.0\n1.0 0.0\n0.0 -1.0\n";
        let bodies = parse_initial_conditions(text).unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1].mass, 2.0);
        assert_eq!(bodies[1].posit, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn parses_flat_layout() {
        let text = "1.0 0.0 0.0 0.0 1.0\n2.0 1.0 0.0 0.0 -1.0\n";
        let bodies = parse_initial_conditions(text).unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].vel, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn empty_input_is_missing_count() {
        assert!(matches!(
            parse_initial_conditions(""),
            Err(IngestError::MissingCount)
        ));
    }

    #[test]
    fn short_record_after_declared_count_is_fatal() {
        let text = "3\n1.0\n0.0 0.0\n0.0 0.0\n";
        let err = parse_initial_conditions(text).unwrap_err();
        assert!(matches!(err, IngestError::ShortRecord { index: 1, .. }));
    }

    #[test]
    fn flat_layout_skips_malformed_lines() {
        let text = "1.0 0.0 0.0 0.0 1.0\nnot a body\n2.0 1.0 0.0 0.0 -1.0\n";
        let bodies = parse_initial_conditions(text).unwrap();
        assert_eq!(bodies.len(), 2);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let text = "1.0 0.0 0.0 0.0 1.0\n\n\n2.0 1.0 0.0 0.0 -1.0\n";
        let bodies = parse_initial_conditions(text).unwrap();
        assert_eq!(bodies.len(), 2);
    }

    #[test]
    fn trajectory_and_energy_frames_round_trip_through_a_buffer() {
        let bodies = vec![Body::new(1.0, Vec2::new(0.5, -0.5), Vec2::new_zero())];
        let mut buf = Vec::new();
        write_trajectory_header(&mut buf).unwrap();
        write_trajectory_frame(&mut buf, 0, &bodies).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "step,id,x0,x1\n0,0,0.5,-0.5\n");
    }
}
