//! Small numeric helpers shared by the analyses

pub fn mean(data: &[f64]) -> Option<f64> {
    match data.len() {
        0 => None,
        count => Some(data.iter().sum::<f64>() / count as f64),
    }
}

/// Population standard deviation
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;
            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round a non-negative measurement to a whole number of units
///
/// Non-finite and negative inputs map to 0.
pub fn round_whole(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(
            std_dev(&[100., 120., 90., 102., 94.]),
            Some(10.322790320451151)
        );
        assert_eq!(std_dev(&[42.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(92.307), 92.3);
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round_whole(2.5), 3);
        assert_eq!(round_whole(-4.0), 0);
        assert_eq!(round_whole(f64::NAN), 0);
    }
}
