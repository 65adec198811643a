//! Helper macro for implementing the standard arithmetic traits on single-field newtypes.

#[macro_export]
macro_rules! op {
    (binary $ty:ident, $op:ident, $fn:ident) => {
        impl $op for $ty {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }
    };
    (inplace $ty:ident, $op:ident, $fn:ident) => {
        impl $op for $ty {
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0)
            }
        }
    };
    (unary $ty:ident, $op:ident, $fn:ident) => {
        impl $op for $ty {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self(self.0.$fn())
            }
        }
    };
}
