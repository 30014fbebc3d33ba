//! Plan computation shared by all resource types.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::resources::ResourceHandler;
use crate::schema::{Attribute, AttributeType};
use crate::types::{AttributeChange, PlanResult};
use crate::validation::normalize;

/// Compute the plan for moving a resource from `prior` to `proposed`.
///
/// - A null `proposed` state plans a destroy.
/// - Computed-only attributes carry over from the prior state.
/// - A change to a `force_new` attribute of an existing resource requires
///   replacement.
/// - Changes the handler suppresses are not reported.
///
/// The handler gets the last word through
/// [`ResourceHandler::customize_plan`].
pub async fn plan_resource(
    handler: &dyn ResourceHandler,
    prior: Option<Value>,
    proposed: Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|state| !state.is_null());

    if proposed.is_null() {
        let changes = prior
            .as_ref()
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let schema = handler.schema();
    let proposed = normalize(&schema, proposed);
    let mut planned = match &proposed {
        Value::Object(obj) => obj.clone(),
        other => {
            return Err(ProviderError::Validation(format!(
                "expected an object for {}, got {}",
                handler.type_name(),
                other
            )))
        },
    };
    let prior_obj = prior.as_ref().and_then(Value::as_object);

    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.attributes {
        let old = get_set(prior_obj, name);

        if attr.flags.is_computed_only() {
            match old {
                Some(value) => planned.insert(name.clone(), value.clone()),
                None => planned.remove(name),
            };
            continue;
        }

        let new = get_set(Some(&planned), name).cloned();
        match (old, new) {
            (None, None) => {},
            (Some(old), Some(new)) if same_value(attr, old, &new) => {},
            (Some(old), Some(new)) if handler.suppress_diff(name, old, &new) => {
                tracing::debug!(resource = handler.type_name(), attribute = %name, "Diff suppressed");
            },
            (old, new) => {
                if attr.force_new && prior_obj.is_some() {
                    requires_replace = true;
                }
                changes.push(AttributeChange::new(name.clone(), old.cloned(), new));
            },
        }
    }

    let mut plan = PlanResult::with_changes(Value::Object(planned), changes, requires_replace);
    handler
        .customize_plan(prior.as_ref(), &proposed, &mut plan)
        .await?;
    Ok(plan)
}

fn get_set<'a>(obj: Option<&'a Map<String, Value>>, name: &str) -> Option<&'a Value> {
    obj.and_then(|o| o.get(name)).filter(|v| !v.is_null())
}

fn same_value(attr: &Attribute, old: &Value, new: &Value) -> bool {
    match (&attr.attr_type, old, new) {
        (AttributeType::Set(_), Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().all(|v| b.contains(v)) && b.iter().all(|v| a.contains(v))
        },
        _ => old == new,
    }
}
