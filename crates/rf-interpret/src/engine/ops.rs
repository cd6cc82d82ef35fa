use super::{Scope, Stager};
use crate::operators;
use crate::svalue::SValue;
use rf_core::ast::{BinOpKind, Expr, ExprBinary, ExprKind, ExprUnary, UnOpKind};
use rf_core::{type_bail, Constraint, Result};
use rf_typing::{constraint_of, disjoint, implies, simplify, Interval};

/// `c` provably admits no value of `required`.
pub(super) fn incompatible(c: &Constraint, required: &Constraint) -> bool {
    !c.is_never() && disjoint(c, required)
}

pub(super) fn require(c: &Constraint, required: &Constraint, what: &str) -> Result<()> {
    if incompatible(c, required) {
        type_bail!("{} expects {}, got {}", what, required, c);
    }
    Ok(())
}

fn numeric_or_string() -> Constraint {
    Constraint::or([Constraint::IsNumber, Constraint::IsString])
}

impl Stager {
    pub(super) fn stage_unary(&mut self, u: &ExprUnary, scope: &Scope) -> Result<SValue> {
        let operand = self.stage(&u.operand, scope)?;
        if let Some(value) = operand.as_value() {
            return Ok(SValue::now(operators::unary(u.op, value)?));
        }
        let c = operand.constraint();
        let constraint = match (u.op, c.literal()) {
            (_, Some(literal)) => constraint_of(&operators::unary(u.op, literal)?),
            (UnOpKind::Neg, None) => {
                require(&c, &Constraint::IsNumber, "`-`")?;
                Interval::of(&c).neg().to_constraint()
            }
            (UnOpKind::Not, None) => {
                require(&c, &Constraint::IsBool, "`!`")?;
                Constraint::IsBool
            }
        };
        let residual = Expr::new(ExprKind::Unary(ExprUnary {
            op: u.op,
            operand: Box::new(self.residualize(&operand, scope)?),
        }));
        Ok(SValue::later(constraint, residual))
    }

    pub(super) fn stage_binary(&mut self, b: &ExprBinary, scope: &Scope) -> Result<SValue> {
        let lhs = self.stage(&b.lhs, scope)?;
        let rhs = self.stage(&b.rhs, scope)?;
        if let (Some(l), Some(r)) = (lhs.as_value(), rhs.as_value()) {
            return Ok(SValue::now(operators::binary(b.op, l, r)?));
        }
        let constraint = binary_constraint(b.op, &lhs.constraint(), &rhs.constraint())?;
        let residual = Expr::new(ExprKind::Binary(ExprBinary {
            op: b.op,
            lhs: Box::new(self.residualize(&lhs, scope)?),
            rhs: Box::new(self.residualize(&rhs, scope)?),
        }));
        Ok(SValue::later(constraint, residual))
    }
}

/// The weakest sound constraint of `a op b` given the operand constraints.
pub(super) fn binary_constraint(op: BinOpKind, a: &Constraint, b: &Constraint) -> Result<Constraint> {
    if let (Some(x), Some(y)) = (a.literal(), b.literal()) {
        return Ok(constraint_of(&operators::binary(op, x, y)?));
    }
    let what = format!("`{}`", op);
    let number = Constraint::IsNumber;
    Ok(match op {
        BinOpKind::Add => {
            if implies(a, &Constraint::IsString) || implies(b, &Constraint::IsString) {
                Constraint::IsString
            } else {
                require(a, &numeric_or_string(), &what)?;
                require(b, &numeric_or_string(), &what)?;
                if disjoint(a, &Constraint::IsString) && disjoint(b, &Constraint::IsString) {
                    Interval::of(a).add(&Interval::of(b)).to_constraint()
                } else {
                    simplify(&numeric_or_string())
                }
            }
        }
        BinOpKind::Sub => {
            require(a, &number, &what)?;
            require(b, &number, &what)?;
            Interval::of(a).sub(&Interval::of(b)).to_constraint()
        }
        BinOpKind::Mul | BinOpKind::Div | BinOpKind::Mod => {
            require(a, &number, &what)?;
            require(b, &number, &what)?;
            number
        }
        BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => {
            require(a, &numeric_or_string(), &what)?;
            require(b, &numeric_or_string(), &what)?;
            if implies(a, &number) && implies(b, &number) {
                decide_ordering(op, &Interval::of(a), &Interval::of(b))
            } else {
                Constraint::IsBool
            }
        }
        BinOpKind::Eq | BinOpKind::Ne if disjoint(a, b) => Constraint::equals(op == BinOpKind::Ne),
        BinOpKind::Eq | BinOpKind::Ne => Constraint::IsBool,
        BinOpKind::And | BinOpKind::Or => {
            require(a, &Constraint::IsBool, &what)?;
            require(b, &Constraint::IsBool, &what)?;
            Constraint::IsBool
        }
    })
}

/// Comparisons settled by the operand ranges alone.
fn decide_ordering(op: BinOpKind, a: &Interval, b: &Interval) -> Constraint {
    let (less, greater) = (a.is_below(b), b.is_below(a));
    let decided = match op {
        BinOpKind::Lt | BinOpKind::Le if less => Some(true),
        BinOpKind::Lt | BinOpKind::Le if greater => Some(false),
        BinOpKind::Gt | BinOpKind::Ge if greater => Some(true),
        BinOpKind::Gt | BinOpKind::Ge if less => Some(false),
        _ => None,
    };
    match decided {
        Some(b) => Constraint::equals(b),
        None => Constraint::IsBool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn addition_propagates_bounds() -> Result<()> {
        let positive = Constraint::and([Constraint::IsNumber, Constraint::Gt(0.0)]);
        let c = binary_constraint(BinOpKind::Add, &positive, &Constraint::equals(1.0))?;
        assert_eq!(c, Constraint::and([Constraint::IsNumber, Constraint::Gt(1.0)]));
        Ok(())
    }

    #[test]
    fn ordering_is_decided_by_disjoint_ranges() -> Result<()> {
        let small = Constraint::and([Constraint::IsNumber, Constraint::Lt(0.0)]);
        let big = Constraint::and([Constraint::IsNumber, Constraint::Gte(10.0)]);
        assert_eq!(binary_constraint(BinOpKind::Lt, &small, &big)?, Constraint::equals(true));
        assert_eq!(binary_constraint(BinOpKind::Ge, &small, &big)?, Constraint::equals(false));
        assert_eq!(
            binary_constraint(BinOpKind::Lt, &small, &Constraint::IsNumber)?,
            Constraint::IsBool
        );
        Ok(())
    }

    #[test]
    fn incompatible_operands_are_type_errors() {
        assert!(binary_constraint(BinOpKind::Sub, &Constraint::IsString, &Constraint::IsNumber).is_err());
        assert!(binary_constraint(BinOpKind::Add, &Constraint::IsBool, &Constraint::Any).is_err());
        assert!(binary_constraint(BinOpKind::Add, &Constraint::Any, &Constraint::IsNumber).is_ok());
    }
}
