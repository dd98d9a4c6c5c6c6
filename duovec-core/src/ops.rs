use crate::{DType, IntDType, Vector};

/// The elementwise arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOpType {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Pow,
    Rem,
}

impl BinaryOpType {
    /// Python-style operator symbol, used in error messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Pow => "**",
            Self::Rem => "%",
        }
    }

    pub fn apply<T: DType>(&self, l: T, r: T) -> T {
        match self {
            Self::Add => l.add(r),
            Self::Sub => l.sub(r),
            Self::Mul => l.mul(r),
            Self::Div => l.div(r),
            Self::FloorDiv => l.floor_div(r),
            Self::Pow => l.pow(r),
            Self::Rem => l.rem(r),
        }
    }

    /// C expression over `a` and `b` (both of type `T`) matching [`Self::apply`].
    /// The helpers it refers to are defined in the CUDA kernel preamble.
    #[cfg(feature = "cuda")]
    pub(crate) fn as_c_expr(&self, integral: bool) -> &'static str {
        match (self, integral) {
            (Self::Add, _) => "a + b",
            (Self::Sub, _) => "a - b",
            (Self::Mul, _) => "a * b",
            (Self::Div, true) => "(b == 0 ? (T)0 : a / b)",
            (Self::Div, false) => "a / b",
            (Self::FloorDiv, true) => "floordiv_int(a, b)",
            (Self::FloorDiv, false) => "floordiv_float(a, b)",
            (Self::Pow, true) => "pow_int(a, b)",
            (Self::Pow, false) => "pow(a, b)",
            (Self::Rem, true) => "mod_int(a, b)",
            (Self::Rem, false) => "mod_float(a, b)",
        }
    }
}

/// The elementwise bitwise operators, defined for integer dtypes only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitwiseOpType {
    And,
    Or,
    Xor,
}

impl BitwiseOpType {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }

    pub fn apply<T: IntDType>(&self, l: T, r: T) -> T {
        match self {
            Self::And => l & r,
            Self::Or => l | r,
            Self::Xor => l ^ r,
        }
    }

    #[cfg(feature = "cuda")]
    pub(crate) fn as_c_expr(&self) -> &'static str {
        match self {
            Self::And => "a & b",
            Self::Or => "a | b",
            Self::Xor => "a ^ b",
        }
    }
}

/// Right-hand side of a vector operation.
///
/// Operations dispatch on the operand category. Anything that is neither a
/// scalar of the vector's dtype nor a vector is `Unsupported`, carrying the
/// offending type name so the error can report it.
#[derive(Clone, Copy)]
pub enum Operand<'a, T: DType> {
    Scalar(T),
    Vector(&'a Vector<T>),
    Unsupported(&'static str),
}

impl<'a, T: DType> Operand<'a, T> {
    /// Wrap a value of a type that vectors cannot operate with.
    pub fn unsupported<U: ?Sized>(_value: &U) -> Self {
        Self::Unsupported(std::any::type_name::<U>())
    }
}

impl<T: DType> From<T> for Operand<'_, T> {
    fn from(value: T) -> Self {
        Self::Scalar(value)
    }
}

impl<'a, T: DType> From<&'a Vector<T>> for Operand<'a, T> {
    fn from(value: &'a Vector<T>) -> Self {
        Self::Vector(value)
    }
}
