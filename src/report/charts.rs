//! Plain-text charts embedded in Markdown code blocks.

/// One equal-width bin over a value range.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// Mean of the paired values falling into the bin, if any.
    pub mean: Option<f64>,
}

/// Split the range of `x` into `bins` equal-width bins and average `y` per bin.
///
/// The last bin is closed on the right so the maximum is included.
pub fn binned_means(x: &[f64], y: &[f64], bins: usize) -> Vec<Bin> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    if points.is_empty() || bins == 0 {
        return Vec::new();
    }

    let lo = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let hi = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let bins = if hi > lo { bins } else { 1 };
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

    let mut sums = vec![(0.0, 0usize); bins];
    for (a, b) in &points {
        let idx = (((a - lo) / width) as usize).min(bins - 1);
        sums[idx].0 += b;
        sums[idx].1 += 1;
    }

    sums.into_iter()
        .enumerate()
        .map(|(i, (sum, count))| Bin {
            lower: lo + i as f64 * width,
            upper: lo + (i + 1) as f64 * width,
            count,
            mean: (count > 0).then(|| sum / count as f64),
        })
        .collect()
}

/// Histogram with one `#` row per bin, scaled to `width` characters.
pub fn histogram(values: &[f64], bins: usize, width: usize) -> String {
    let bins = binned_means(values, values, bins);
    let max = bins.iter().map(|b| b.count).max().unwrap_or(0);
    if max == 0 {
        return String::from("(no data)\n");
    }

    let mut out = String::new();
    for bin in &bins {
        let len = bin.count * width / max;
        out.push_str(&format!(
            "[{:>8.2}, {:>8.2}] | {:<width$} {}\n",
            bin.lower,
            bin.upper,
            "#".repeat(len),
            bin.count,
            width = width
        ));
    }
    out
}

/// Horizontal bars for signed values; negative bars use `-`, positive `+`.
pub fn horizontal_bars(items: &[(String, f64)], width: usize) -> String {
    if items.is_empty() {
        return String::from("(no data)\n");
    }
    let max = items.iter().map(|(_, v)| v.abs()).fold(0.0, f64::max);
    let label_width = items.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, value) in items {
        let len = if max > 0.0 {
            (value.abs() / max * width as f64).round() as usize
        } else {
            0
        };
        let mark = if *value < 0.0 { "-" } else { "+" };
        out.push_str(&format!(
            "{:<lw$} | {:<width$} {:.2}%\n",
            label,
            mark.repeat(len),
            value,
            lw = label_width,
            width = width
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binned_means() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 5.0, 7.0, 9.0];
        let bins = binned_means(&x, &y, 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[0].mean, Some(2.0));
        // The right edge lands in the last bin.
        assert_eq!(bins[1].count, 3);
        assert_eq!(bins[1].mean, Some(7.0));
    }

    #[test]
    fn test_binned_means_constant_x() {
        let bins = binned_means(&[1.0, 1.0], &[2.0, 4.0], 5);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].mean, Some(3.0));
        assert!(binned_means(&[], &[], 5).is_empty());
    }

    #[test]
    fn test_histogram() {
        let text = histogram(&[1.0, 1.0, 1.0, 2.0], 2, 6);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("######"));
        assert!(lines[0].ends_with(" 3"));
        assert!(lines[1].contains("## "));
        assert_eq!(histogram(&[], 5, 10), "(no data)\n");
    }

    #[test]
    fn test_horizontal_bars() {
        let items = vec![("All Deals".to_string(), 2.0), ("Green".to_string(), -1.0)];
        let text = horizontal_bars(&items, 4);
        assert!(text.contains("All Deals | ++++ 2.00%"));
        assert!(text.contains("Green     | --   -1.00%"));
    }
}
