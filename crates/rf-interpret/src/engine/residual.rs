use super::{Scope, Stager};
use crate::error::staging_error_at;
use crate::svalue::{SValue, StagedClosure};
use rf_core::ast::{ArrayEntry, Expr, ExprKind, ObjectEntry};
use rf_core::Result;

impl Stager {
    /// Expression reproducing `value` at runtime in `scope`.
    pub(crate) fn residualize(&mut self, value: &SValue, scope: &Scope) -> Result<Expr> {
        if let Some(binding) = value.binding().filter(|b| scope.is_visible(b)) {
            if let SValue::Closure(closure) = value {
                self.ensure_generic(closure, binding)?;
            }
            return Ok(Expr::var(&binding.name));
        }
        match value {
            SValue::Now { value: v, .. } => Expr::from_value(v).ok_or_else(|| {
                staging_error_at(format!("{} has no runtime representation", v.repr()), None)
            }),
            SValue::Later { residual, .. } => Ok(residual.clone()),
            SValue::LaterArray { elements, .. } => {
                let items = elements
                    .iter()
                    .map(|e| Ok(ArrayEntry::Item(self.residualize(e, scope)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::new(ExprKind::Array(items)))
            }
            SValue::LaterObject { fields, .. } => {
                let entries = fields
                    .iter()
                    .map(|(name, f)| {
                        Ok(ObjectEntry::Field {
                            name: name.clone(),
                            value: self.residualize(f, scope)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::new(ExprKind::Object(entries)))
            }
            SValue::Closure(closure) => self.residualize_closure(closure),
        }
    }

    /// A function literal for a closure whose binding is not visible.
    fn residualize_closure(&mut self, closure: &StagedClosure) -> Result<Expr> {
        if closure.lambda.name.is_some() {
            let binding = self.self_binding(closure);
            self.ensure_generic(closure, &binding)?;
            return self.generic_lambda(&binding);
        }
        if let Some(lambda) = self.anonymous.get(&closure.id) {
            return Ok(lambda.clone());
        }
        let arity = closure.lambda.arity();
        let (lambda, _) = self.stage_definition(closure, None, None, &vec![None; arity], &vec![None; arity])?;
        self.anonymous.insert(closure.id, lambda.clone());
        Ok(lambda)
    }
}
