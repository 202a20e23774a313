use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;

use crate::expr::Expression;
use crate::value::Value;

/// How a comparison applies to a collection on its left side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComparisonModifier {
    #[default]
    Direct,
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    EqualTo,
    NotEqualTo,
    Matches,
    Like,
    BeginsWith,
    EndsWith,
    In,
    CustomSelector,
    Contains,
    Between,
}

impl ComparisonOperator {
    /// Canonical spelling, as printed by `Display`.
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::EqualTo => "==",
            ComparisonOperator::NotEqualTo => "!=",
            ComparisonOperator::Matches => "MATCHES",
            ComparisonOperator::Like => "LIKE",
            ComparisonOperator::BeginsWith => "BEGINSWITH",
            ComparisonOperator::EndsWith => "ENDSWITH",
            ComparisonOperator::In => "IN",
            ComparisonOperator::CustomSelector => "CUSTOMSELECTOR",
            ComparisonOperator::Contains => "CONTAINS",
            ComparisonOperator::Between => "BETWEEN",
        }
    }
}

bitflags! {
    /// String folding applied to both operands before comparing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComparisonOptions: u8 {
        const CASE_INSENSITIVE      = 0b0001;
        const DIACRITIC_INSENSITIVE = 0b0010;
        const NORMALIZED            = 0b0100;
    }
}

impl fmt::Display for ComparisonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.contains(ComparisonOptions::CASE_INSENSITIVE);
        let d = self.contains(ComparisonOptions::DIACRITIC_INSENSITIVE);
        match (c, d) {
            (true, true) => f.write_str("[cd]"),
            (true, false) => f.write_str("[c]"),
            (false, true) => f.write_str("[d]"),
            (false, false) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundKind {
    Not,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Expression,
    pub right: Expression,
    pub modifier: ComparisonModifier,
    pub operator: ComparisonOperator,
    pub options: ComparisonOptions,
}

/// Predicate tree.
///
/// `Compound { kind: Not, .. }` holds exactly one subpredicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Value(bool),
    Comparison(Comparison),
    Compound { kind: CompoundKind, subpredicates: Vec<Predicate> },
}

impl Predicate {
    pub fn comparison(left: Expression, operator: ComparisonOperator, right: Expression) -> Self {
        Predicate::Comparison(Comparison {
            left,
            right,
            modifier: ComparisonModifier::Direct,
            operator,
            options: ComparisonOptions::empty(),
        })
    }

    pub fn not(predicate: Predicate) -> Self {
        Predicate::Compound { kind: CompoundKind::Not, subpredicates: vec![predicate] }
    }

    pub fn and(subpredicates: Vec<Predicate>) -> Self {
        Predicate::Compound { kind: CompoundKind::And, subpredicates }
    }

    pub fn or(subpredicates: Vec<Predicate>) -> Self {
        Predicate::Compound { kind: CompoundKind::Or, subpredicates }
    }

    /// Join `left` and `right` under `kind`, splicing either side that is
    /// already a compound of the same kind.
    ///
    /// When only the right side is spliced its children come first, followed
    /// by `left`.
    pub fn fold(kind: CompoundKind, left: Predicate, right: Predicate) -> Predicate {
        let subpredicates = match (left, right) {
            (
                Predicate::Compound { kind: lk, subpredicates: mut lsubs },
                Predicate::Compound { kind: rk, subpredicates: rsubs },
            ) if lk == kind && rk == kind => {
                lsubs.extend(rsubs);
                lsubs
            }
            (left, Predicate::Compound { kind: rk, subpredicates: mut rsubs }) if rk == kind => {
                rsubs.push(left);
                rsubs
            }
            (Predicate::Compound { kind: lk, subpredicates: mut lsubs }, right) if lk == kind => {
                lsubs.push(right);
                lsubs
            }
            (left, right) => vec![left, right],
        };
        Predicate::Compound { kind, subpredicates }
    }

    /// Copy of this tree with `$variables` replaced in every comparison.
    pub fn with_substitutions(&self, variables: &HashMap<String, Value>) -> Predicate {
        match self {
            Predicate::Value(_) => self.clone(),
            Predicate::Comparison(c) => Predicate::Comparison(Comparison {
                left: c.left.with_substitutions(variables),
                right: c.right.with_substitutions(variables),
                ..c.clone()
            }),
            Predicate::Compound { kind, subpredicates } => Predicate::Compound {
                kind: *kind,
                subpredicates: subpredicates.iter().map(|p| p.with_substitutions(variables)).collect(),
            },
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            ComparisonModifier::Direct => {}
            ComparisonModifier::Any => f.write_str("ANY ")?,
            ComparisonModifier::All => f.write_str("ALL ")?,
        }
        write!(f, "{} {}{} {}", self.left, self.operator.symbol(), self.options, self.right)
    }
}

impl fmt::Display for Predicate {
    /// Parenthesizes every compound child so the text parses back to the same tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Value(true) => f.write_str("TRUEPREDICATE"),
            Predicate::Value(false) => f.write_str("FALSEPREDICATE"),
            Predicate::Comparison(c) => write!(f, "{c}"),
            Predicate::Compound { kind: CompoundKind::Not, subpredicates } => {
                f.write_str("NOT ")?;
                match subpredicates.first() {
                    Some(p) => write!(f, "({p})"),
                    None => f.write_str("(TRUEPREDICATE)"),
                }
            }
            Predicate::Compound { kind, subpredicates } => {
                let joiner = if *kind == CompoundKind::And { " AND " } else { " OR " };
                for (idx, p) in subpredicates.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "({p})")?;
                }
                Ok(())
            }
        }
    }
}
