use super::{Scope, Stager};
use crate::operators;
use crate::svalue::{SValue, StagedClosure};
use rf_core::ast::{BinOpKind, Expr, ExprKind, TemplatePart};
use rf_core::{type_bail, Constraint, Result, Value};

impl Stager {
    pub(crate) fn stage(&mut self, expr: &Expr, scope: &Scope) -> Result<SValue> {
        self.stage_kind(expr, scope)
            .map_err(|e| e.with_span(expr.span))
    }

    fn stage_kind(&mut self, expr: &Expr, scope: &Scope) -> Result<SValue> {
        match &expr.kind {
            ExprKind::Literal(l) => Ok(SValue::now(l.to_value())),
            ExprKind::Value(v) => Ok(SValue::now(v.as_ref().clone())),
            ExprKind::Var(name) => self.stage_var(name, scope),
            ExprKind::Unary(u) => self.stage_unary(u, scope),
            ExprKind::Binary(b) if matches!(b.op, BinOpKind::And | BinOpKind::Or) => {
                self.stage_logical(b, scope)
            }
            ExprKind::Binary(b) => self.stage_binary(b, scope),
            ExprKind::If(i) => self.stage_if(i, scope),
            ExprKind::Let(l) => self.stage_let(l, scope),
            ExprKind::Lambda(lambda) => {
                let id = self.fresh_id();
                Ok(SValue::Closure(StagedClosure {
                    id,
                    lambda: lambda.clone(),
                    scope: scope.clone(),
                    binding: None,
                }))
            }
            ExprKind::Call(call) => self.stage_call(call, expr.span, scope),
            ExprKind::Object(entries) => self.stage_object(entries, scope),
            ExprKind::Array(entries) => self.stage_array(entries, scope),
            ExprKind::Field(f) => {
                let object = self.stage(&f.object, scope)?;
                self.field_of(&object, &f.name)
            }
            ExprKind::Index(i) => {
                let object = self.stage(&i.object, scope)?;
                let key = self.stage(&i.index, scope)?;
                self.index_of(&object, &key, scope)
            }
            ExprKind::Template(parts) => self.stage_template(parts, scope),
            ExprKind::Block(block) => self.stage_items(&block.items, &block.result, scope),
            ExprKind::Await(inner) => {
                let value = self.stage(inner, scope)?;
                let residual = self.residualize(&value, scope)?;
                Ok(SValue::later(
                    Constraint::Any,
                    Expr::new(ExprKind::Await(Box::new(residual))),
                ))
            }
            ExprKind::Throw(inner) => {
                let value = self.stage(inner, scope)?;
                let residual = self.residualize(&value, scope)?;
                Ok(SValue::later(
                    Constraint::Never,
                    Expr::new(ExprKind::Throw(Box::new(residual))),
                ))
            }
            ExprKind::Match(m) => self.stage_match(m, scope),
        }
    }

    fn stage_var(&mut self, name: &str, scope: &Scope) -> Result<SValue> {
        if let Some(value) = scope.get(name) {
            return Ok(value);
        }
        match self.registry.lookup(name) {
            Some(value) => Ok(SValue::now(value)),
            None => type_bail!("unbound variable `{}`", name),
        }
    }

    fn stage_template(&mut self, parts: &[TemplatePart], scope: &Scope) -> Result<SValue> {
        let mut staged = Vec::with_capacity(parts.len());
        for part in parts {
            staged.push(match part {
                TemplatePart::Text(text) => SValue::now(Value::string(text.clone())),
                TemplatePart::Expr(e) => self.stage(e, scope)?,
            });
        }
        if let Some(values) = staged
            .iter()
            .map(|s| s.as_value())
            .collect::<Option<Vec<_>>>()
        {
            let text: String = values.into_iter().map(operators::template_piece).collect();
            return Ok(SValue::now(Value::String(text)));
        }
        let mut residual = Vec::with_capacity(parts.len());
        for value in &staged {
            residual.push(match value.as_value() {
                Some(v) if !v.is_compound() => TemplatePart::Text(operators::template_piece(v)),
                _ => TemplatePart::Expr(self.residualize(value, scope)?),
            });
        }
        Ok(SValue::later(
            Constraint::IsString,
            Expr::new(ExprKind::Template(merge_text(residual))),
        ))
    }
}

/// Join adjacent text parts.
fn merge_text(parts: Vec<TemplatePart>) -> Vec<TemplatePart> {
    let mut out: Vec<TemplatePart> = Vec::with_capacity(parts.len());
    for part in parts {
        match (out.last_mut(), part) {
            (Some(TemplatePart::Text(prev)), TemplatePart::Text(text)) => prev.push_str(&text),
            (_, part) => out.push(part),
        }
    }
    out
}
