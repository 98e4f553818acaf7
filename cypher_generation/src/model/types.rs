use std::fmt;

/// Marks a type whose values can NOT be null.
pub const NON_NULL_MASK: u16 = 0x8000;
/// Marks a list of the underlying type.
pub const LIST_MASK: u16 = 0x4000;

const BASE_MASK: u16 = !(NON_NULL_MASK | LIST_MASK);

/// Type of a property value, optionally carrying the list and non-null masks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PropertyType(u16);

impl PropertyType {
    pub const ANY: Self = Self(0);
    pub const BOOLEAN: Self = Self(1);
    pub const DATE: Self = Self(2);
    pub const DATETIME: Self = Self(3);
    pub const DURATION: Self = Self(4);
    pub const FLOAT: Self = Self(5);
    pub const INTEGER: Self = Self(6);
    pub const LOCAL_DATE_TIME: Self = Self(7);
    pub const LOCAL_TIME: Self = Self(8);
    pub const POINT: Self = Self(9);
    pub const STRING: Self = Self(10);
    pub const TIME: Self = Self(11);
    // Narrower integer and float domains for LIMIT/SKIP, percentiles,
    // substring offsets and rounding precision.
    pub const POSITIVE_INTEGER: Self = Self(12);
    pub const PERCENTILE: Self = Self(13);
    pub const INT32: Self = Self(14);
    pub const POSITIVE_INT32: Self = Self(15);

    /// Types a generated property may take, in generation order.
    pub const GENERATABLE: [Self; 12] = [
        Self::BOOLEAN,
        Self::DATE,
        Self::DATETIME,
        Self::DURATION,
        Self::FLOAT,
        Self::INTEGER,
        Self::LOCAL_DATE_TIME,
        Self::LOCAL_TIME,
        Self::POINT,
        Self::STRING,
        Self::TIME,
        Self::POSITIVE_INTEGER,
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn with_mask(self, mask: u16) -> Self {
        Self(self.0 | mask)
    }

    pub const fn without_mask(self, mask: u16) -> Self {
        Self(self.0 & !mask)
    }

    pub const fn base(self) -> Self {
        Self(self.0 & BASE_MASK)
    }

    pub const fn is_list(self) -> bool {
        self.0 & LIST_MASK != 0
    }

    pub const fn is_non_null(self) -> bool {
        self.0 & NON_NULL_MASK != 0
    }
}

impl fmt::Debug for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyType({:#06X})", self.0)
    }
}

/// Type of a structural value (node, relationship or path), with the same masks as [PropertyType].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StructuralType(u16);

impl StructuralType {
    pub const ANY: Self = Self(0);
    pub const NODE: Self = Self(1);
    pub const RELATIONSHIP: Self = Self(2);
    pub const PATH: Self = Self(3);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn with_mask(self, mask: u16) -> Self {
        Self(self.0 | mask)
    }

    pub const fn without_mask(self, mask: u16) -> Self {
        Self(self.0 & !mask)
    }

    pub const fn base(self) -> Self {
        Self(self.0 & BASE_MASK)
    }

    pub const fn is_list(self) -> bool {
        self.0 & LIST_MASK != 0
    }
}

impl fmt::Debug for StructuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base() {
            Self::ANY => f.write_str("ANY")?,
            Self::NODE => f.write_str("NODE")?,
            Self::RELATIONSHIP => f.write_str("RELATIONSHIP")?,
            Self::PATH => f.write_str("PATH")?,
            other => write!(f, "{:#X}", other.0)?,
        }
        if self.is_list() {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Whether an expression evaluates to a property or a structural value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpressionType {
    #[default]
    Any,
    PropertyValue,
    StructuralValue,
}

impl ExpressionType {
    /// Maps `0..3` onto the variants, in declaration order.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Any,
            1 => Self::PropertyValue,
            _ => Self::StructuralValue,
        }
    }
}

/// All options dictating how an expression gets generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpressionConfig {
    pub must_be_non_null: bool,
    pub is_list: bool,
    pub target_type: ExpressionType,
    /// Only relevant if the target type is not structural.
    pub property_type: PropertyType,
    /// Only relevant if the target type is not a property value.
    pub structural_type: StructuralType,
    /// Constant expressions cannot reference variables.
    pub is_constant_expression: bool,
    /// Set inside RETURN and WITH projections.
    pub can_contain_aggregating_functions: bool,
    pub allow_maps: bool,
    /// Whatever this expression evaluates to gets deleted from the graph.
    pub gets_deleted: bool,
}

impl ExpressionConfig {
    pub const fn property(property_type: PropertyType) -> Self {
        Self {
            must_be_non_null: false,
            is_list: false,
            target_type: ExpressionType::PropertyValue,
            property_type,
            structural_type: StructuralType::ANY,
            is_constant_expression: false,
            can_contain_aggregating_functions: false,
            allow_maps: false,
            gets_deleted: false,
        }
    }

    pub const fn structural(structural_type: StructuralType) -> Self {
        Self {
            must_be_non_null: false,
            is_list: false,
            target_type: ExpressionType::StructuralValue,
            property_type: PropertyType::ANY,
            structural_type,
            is_constant_expression: false,
            can_contain_aggregating_functions: false,
            allow_maps: false,
            gets_deleted: false,
        }
    }

    pub const fn any() -> Self {
        Self {
            must_be_non_null: false,
            is_list: false,
            target_type: ExpressionType::Any,
            property_type: PropertyType::ANY,
            structural_type: StructuralType::ANY,
            is_constant_expression: false,
            can_contain_aggregating_functions: false,
            allow_maps: false,
            gets_deleted: false,
        }
    }

    pub const fn list(mut self) -> Self {
        self.is_list = true;
        self
    }

    pub const fn non_null(mut self) -> Self {
        self.must_be_non_null = true;
        self
    }

    pub const fn constant(mut self) -> Self {
        self.is_constant_expression = true;
        self
    }

    /// The list and non-null masks this config implies.
    pub const fn masks(&self) -> u16 {
        let mut mask = 0;
        if self.is_list {
            mask |= LIST_MASK;
        }
        if self.must_be_non_null {
            mask |= NON_NULL_MASK;
        }
        mask
    }

    pub const fn list_mask(&self) -> u16 {
        if self.is_list {
            LIST_MASK
        } else {
            0
        }
    }
}

/// A function callable from a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: &'static str,
    pub input_types: &'static [ExpressionConfig],
    /// The function may return null even if all of its arguments are non-null.
    pub can_always_be_null: bool,
}

impl Function {
    pub const fn new(name: &'static str, input_types: &'static [ExpressionConfig]) -> Self {
        Self {
            name,
            input_types,
            can_always_be_null: false,
        }
    }

    pub const fn nullable(name: &'static str, input_types: &'static [ExpressionConfig]) -> Self {
        Self {
            name,
            input_types,
            can_always_be_null: true,
        }
    }
}
