//! Coordinate geometry: distances and angles, single and batched.
//!
//! The batched forms work element-wise over equally long point slices, which
//! is how the hydrogen-bond criterion is evaluated for many candidate
//! triplets at once. The `*_stacked` forms add a leading model axis.

use molstack_core::{MolError, Result};

use crate::types::Point3D;

/// Euclidean distance between two points.
pub fn distance(p1: &Point3D, p2: &Point3D) -> f64 {
    p1.distance_to(p2)
}

/// Angle in radians at the central point `p2`.
pub fn angle(p1: &Point3D, p2: &Point3D, p3: &Point3D) -> f64 {
    let v1 = p1.sub(p2);
    let v2 = p3.sub(p2);
    let cos_angle = v1.dot(&v2) / (v1.norm() * v2.norm());
    // Clamp for numerical safety
    cos_angle.clamp(-1.0, 1.0).acos()
}

fn check_lengths(lens: &[usize]) -> Result<()> {
    if lens.windows(2).any(|w| w[0] != w[1]) {
        return Err(MolError::InvalidInput(format!(
            "batched geometry needs equal-length inputs, got {:?}",
            lens
        )));
    }
    Ok(())
}

/// Element-wise distances `|a[i] - b[i]|`.
pub fn distance_batch(a: &[Point3D], b: &[Point3D]) -> Result<Vec<f64>> {
    check_lengths(&[a.len(), b.len()])?;
    Ok(a.iter().zip(b).map(|(p, q)| distance(p, q)).collect())
}

/// Element-wise angles in radians at `b[i]`.
pub fn angle_batch(a: &[Point3D], b: &[Point3D], c: &[Point3D]) -> Result<Vec<f64>> {
    check_lengths(&[a.len(), b.len(), c.len()])?;
    Ok(a.iter()
        .zip(b)
        .zip(c)
        .map(|((p, q), r)| angle(p, q, r))
        .collect())
}

/// [`distance_batch`] over a leading model axis.
pub fn distance_stacked(a: &[Vec<Point3D>], b: &[Vec<Point3D>]) -> Result<Vec<Vec<f64>>> {
    check_lengths(&[a.len(), b.len()])?;
    a.iter()
        .zip(b)
        .map(|(fa, fb)| distance_batch(fa, fb))
        .collect()
}

/// [`angle_batch`] over a leading model axis.
pub fn angle_stacked(
    a: &[Vec<Point3D>],
    b: &[Vec<Point3D>],
    c: &[Vec<Point3D>],
) -> Result<Vec<Vec<f64>>> {
    check_lengths(&[a.len(), b.len(), c.len()])?;
    a.iter()
        .zip(b)
        .zip(c)
        .map(|((fa, fb), fc)| angle_batch(fa, fb, fc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;

    #[test]
    fn test_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(3.0, 4.0, 0.0);
        assert!((distance(&a, &b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_angle_90() {
        let p1 = Point3D::new(1.0, 0.0, 0.0);
        let p2 = Point3D::new(0.0, 0.0, 0.0);
        let p3 = Point3D::new(0.0, 1.0, 0.0);
        assert!((angle(&p1, &p2, &p3) - PI / 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_angle_180() {
        let p1 = Point3D::new(-1.0, 0.0, 0.0);
        let p2 = Point3D::new(0.0, 0.0, 0.0);
        let p3 = Point3D::new(1.0, 0.0, 0.0);
        assert!((angle(&p1, &p2, &p3) - PI).abs() < 1e-10);
    }

    #[test]
    fn batch_matches_single() {
        let a = vec![Point3D::new(1.0, 0.0, 0.0), Point3D::new(0.0, 2.0, 0.0)];
        let b = vec![Point3D::zero(), Point3D::zero()];
        let c = vec![Point3D::new(0.0, 1.0, 0.0), Point3D::new(0.0, -1.0, 0.0)];

        let d = distance_batch(&a, &b).unwrap();
        assert!((d[0] - 1.0).abs() < 1e-10);
        assert!((d[1] - 2.0).abs() < 1e-10);

        let theta = angle_batch(&a, &b, &c).unwrap();
        assert!((theta[0] - PI / 2.0).abs() < 1e-10);
        assert!((theta[1] - PI).abs() < 1e-10);
    }

    #[test]
    fn batch_length_mismatch() {
        let a = vec![Point3D::zero()];
        let b = vec![Point3D::zero(), Point3D::zero()];
        assert!(distance_batch(&a, &b).is_err());
        assert!(angle_batch(&a, &a, &b).is_err());
    }

    #[test]
    fn stacked_has_model_axis() {
        let a = vec![vec![Point3D::new(1.0, 0.0, 0.0)], vec![Point3D::new(2.0, 0.0, 0.0)]];
        let b = vec![vec![Point3D::zero()], vec![Point3D::zero()]];
        let d = distance_stacked(&a, &b).unwrap();
        assert_eq!(d.len(), 2);
        assert!((d[1][0] - 2.0).abs() < 1e-10);
        assert!(distance_stacked(&a, &b[..1]).is_err());

        let c = vec![vec![Point3D::new(0.0, 1.0, 0.0)], vec![Point3D::new(-1.0, 0.0, 0.0)]];
        let theta = angle_stacked(&a, &b, &c).unwrap();
        assert!((theta[0][0] - PI / 2.0).abs() < 1e-10);
        assert!((theta[1][0] - PI).abs() < 1e-10);
    }
}
