use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// 2D vector used for velocities and physical-space geometry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const UP: Vec2 = Vec2 { x: 0.0, y: -1.0 };
    pub const DOWN: Vec2 = Vec2 { x: 0.0, y: 1.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Returns normalized vector and original length
    ///
    /// A zero (or non-finite) length yields `None` so callers pick their own fallback.
    pub fn normalize_with_length(&self) -> Option<(Self, f64)> {
        let len = self.length();
        if len > f64::EPSILON && len.is_finite() {
            Some((
                Self {
                    x: self.x / len,
                    y: self.y / len,
                },
                len,
            ))
        } else {
            None
        }
    }

    #[inline]
    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f64 {
        (*self - other).length()
    }

    /// Scales the vector down to `max` magnitude, keeping its direction
    pub fn clamp_length(&self, max: f64) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            *self * (max / len)
        } else {
            *self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Check if vector is approximately equal to another
    pub fn approx_eq(&self, other: Vec2, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon
    }
}

macro_rules! componentwise {
    ($trait:ident, $method:ident, $op:tt, $assign_trait:ident, $assign:ident, $assign_op:tt) => {
        impl $trait for Vec2 {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                Self::new(self.x $op rhs.x, self.y $op rhs.y)
            }
        }

        impl $assign_trait for Vec2 {
            #[inline]
            fn $assign(&mut self, rhs: Self) {
                self.x $assign_op rhs.x;
                self.y $assign_op rhs.y;
            }
        }
    };
}

componentwise!(Add, add, +, AddAssign, add_assign, +=);
componentwise!(Sub, sub, -, SubAssign, sub_assign, -=);

impl Mul<f64> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}

impl Mul<Vec2> for f64 {
    type Output = Vec2;
    #[inline]
    fn mul(self, v: Vec2) -> Vec2 {
        v * self
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}
