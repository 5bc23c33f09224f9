use std::fmt::{self, Display, Formatter};

use crate::{Comparison, RunRecord};

/// Renders the comparison as a Markdown section with a fenced table of every round, the
/// per-side average and minimum and the resulting speedup. Times are in seconds.
impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (first, second) = (self.first(), self.second());

        writeln!(
            f,
            "\n## Testing {} - {} versus {}",
            self.name(),
            first.label(),
            second.label()
        )?;
        write!(f, "\n```\n")?;

        write_table(
            f,
            "Warmup",
            (first.label(), second.label()),
            first.series().warmup(),
            second.series().warmup(),
        )?;
        writeln!(f)?;
        write_table(
            f,
            "Timed",
            (first.label(), second.label()),
            first.series().timed(),
            second.series().timed(),
        )?;

        writeln!(f)?;
        writeln!(
            f,
            "{:>10}:  {:>10.6} seconds average",
            first.label(),
            first.average_seconds()
        )?;
        writeln!(
            f,
            "{:>10}:  {:>10.6} seconds average\n",
            second.label(),
            second.average_seconds()
        )?;
        writeln!(
            f,
            "{:>10}:  {:>10.6} seconds minimum",
            first.label(),
            first.minimum_seconds()
        )?;
        writeln!(
            f,
            "{:>10}:  {:>10.6} seconds minimum\n",
            second.label(),
            second.minimum_seconds()
        )?;

        writeln!(f, "{:>10}: x{:>10.6} ", "Speedup", self.speedup())?;
        write!(f, "```\n\n")
    }
}

fn write_table(
    f: &mut Formatter<'_>,
    heading: &str,
    labels: (&str, &str),
    first: &[RunRecord],
    second: &[RunRecord],
) -> fmt::Result {
    writeln!(f, "{heading:<6}    {:>10}    {:>10}", labels.0, labels.1)?;

    for (a, b) in first.iter().zip(second) {
        writeln!(f, "{:<6}    {:>10.6}    {:>10.6}", a.index(), a.seconds(), b.seconds())?;
    }

    Ok(())
}
