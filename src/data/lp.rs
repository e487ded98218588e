use crate::core::{Direction, LinExpr, Model, Sense, VarKind};
use std::io::Write;

/// Writes the model in CPLEX LP format.
///
/// # Errors
/// - If writing fails.
pub fn write_lp(model: &Model, writer: &mut impl Write) -> anyhow::Result<()> {
    writeln!(writer, "\\ {}", model.name())?;
    match model.direction() {
        Direction::Minimize => writeln!(writer, "Minimize")?,
        Direction::Maximize => writeln!(writer, "Maximize")?,
    }
    let objective = model.objective();
    write!(writer, " obj:")?;
    write_terms(model, objective, writer)?;
    // The format has no objective constant; it is kept as a comment.
    writeln!(writer)?;
    if objective.constant_term() != 0.0 {
        writeln!(writer, "\\ constant {:?}", objective.constant_term())?;
    }

    writeln!(writer, "Subject To")?;
    for constraint in model.constraints() {
        write!(writer, " {}:", constraint.name)?;
        write_terms(model, &constraint.expr, writer)?;
        let sense = match constraint.sense {
            Sense::Equal => "=",
            Sense::LessEqual => "<=",
            Sense::GreaterEqual => ">=",
        };
        writeln!(
            writer,
            " {sense} {:?}",
            constraint.rhs - constraint.expr.constant_term()
        )?;
    }

    writeln!(writer, "Bounds")?;
    for var in model.variables() {
        if var.kind == VarKind::Binary {
            continue;
        }
        match var.upper {
            Some(upper) => writeln!(writer, " {:?} <= {} <= {upper:?}", var.lower, var.name)?,
            None => writeln!(writer, " {} >= {:?}", var.name, var.lower)?,
        }
    }

    for (header, kind) in [("Generals", VarKind::Integer), ("Binaries", VarKind::Binary)] {
        let names: Vec<&str> = model
            .variables()
            .iter()
            .filter(|var| var.kind == kind)
            .map(|var| var.name.as_str())
            .collect();
        if !names.is_empty() {
            writeln!(writer, "{header}")?;
            writeln!(writer, " {}", names.join(" "))?;
        }
    }

    writeln!(writer, "End")?;
    Ok(())
}

fn write_terms(model: &Model, expr: &LinExpr, writer: &mut impl Write) -> std::io::Result<()> {
    if expr.terms().is_empty() {
        return write!(writer, " 0");
    }
    for &(var, coefficient) in expr.terms() {
        let sign = if coefficient < 0.0 { '-' } else { '+' };
        write!(
            writer,
            " {sign} {:?} {}",
            coefficient.abs(),
            model.variable(var).name
        )?;
    }
    Ok(())
}
