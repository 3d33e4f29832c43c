//! Wire format of the deep GraphQL endpoint: operation documents, filter and
//! insert encoding, and response decoding.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use linktrack_core::model::{Link, LinkId, NewLink, Session};
use linktrack_core::query::LinkFilter;

use crate::error::ProtocolError;

const LINK_FIELDS: &str = "id type_id from_id to_id string { value }";

/// Names are `Contain` edges from the package link to the named link, carrying
/// the name as their string value.
pub const RESOLVE_NAME: &str = "query ResolveName($namespace: String!, $name: String!) { \
links(where: { string: { value: { _eq: $name } }, from: { string: { value: { _eq: $namespace } } } }, limit: 1) { to_id } }";

pub const GUEST: &str = "mutation Guest { guest { linkId token error } }";

pub const LOGIN: &str =
    "mutation Login($linkId: Int) { jwt(input: { linkId: $linkId }) { linkId token error } }";

pub fn select_document() -> String {
    format!("query SelectLinks($where: links_bool_exp!) {{ links(where: $where) {{ {LINK_FIELDS} }} }}")
}

pub fn insert_document() -> String {
    format!(
        "mutation InsertLinks($objects: [links_insert_input!]!) {{ insert_links(objects: $objects) {{ returning {{ {LINK_FIELDS} }} }} }}"
    )
}

pub const DELETE: &str = "mutation DeleteLinks($where: links_bool_exp!) { delete_links(where: $where) { affected_rows } }";

/// Request body posted to the endpoint.
#[derive(Debug, Serialize)]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

/// Unwrap `{ data, errors }`, turning any reported error into a failure.
pub fn decode_envelope(body: Value) -> Result<Value, ProtocolError> {
    let envelope: Envelope = serde_json::from_value(body)?;
    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(ProtocolError::Graphql(messages.join("; ")));
    }
    envelope.data.ok_or(ProtocolError::MissingField("data"))
}

fn eq<T: Serialize>(value: T) -> Value {
    json!({ "_eq": value })
}

/// Encode a filter as a `links_bool_exp`.
pub fn bool_exp(filter: &LinkFilter) -> Value {
    let mut exp = Map::new();
    if let Some(id) = filter.id {
        exp.insert("id".into(), eq(id));
    }
    if let Some(type_id) = filter.type_id {
        exp.insert("type_id".into(), eq(type_id));
    }
    if let Some(from_id) = filter.from_id {
        exp.insert("from_id".into(), eq(from_id));
    }
    if let Some(to_id) = filter.to_id {
        exp.insert("to_id".into(), eq(to_id));
    }
    if let Some(value) = &filter.value {
        exp.insert("string".into(), json!({ "value": eq(value) }));
    }
    if let Some(from) = &filter.from {
        exp.insert("from".into(), bool_exp(from));
    }
    if let Some(to) = &filter.to {
        exp.insert("to".into(), bool_exp(to));
    }
    if let Some(incoming) = &filter.incoming {
        exp.insert("in".into(), bool_exp(incoming));
    }
    if let Some(up) = &filter.up {
        exp.insert(
            "up".into(),
            json!({ "tree_id": eq(up.tree_id), "parent": bool_exp(&up.parent) }),
        );
    }
    Value::Object(exp)
}

/// Encode an insert as a `links_insert_input`, nesting the containing edge
/// under `in`.
pub fn insert_object(link: &NewLink) -> Value {
    let mut obj = Map::new();
    obj.insert("type_id".into(), json!(link.type_id));
    if let Some(from_id) = link.from_id {
        obj.insert("from_id".into(), json!(from_id));
    }
    if let Some(to_id) = link.to_id {
        obj.insert("to_id".into(), json!(to_id));
    }
    if let Some(value) = &link.value {
        obj.insert("string".into(), json!({ "data": { "value": value } }));
    }
    if let Some(container) = &link.contained_by {
        obj.insert("in".into(), json!({ "data": [insert_object(container)] }));
    }
    Value::Object(obj)
}

#[derive(Debug, Deserialize)]
struct RawString {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    id: i64,
    type_id: i64,
    #[serde(default)]
    from_id: Option<i64>,
    #[serde(default)]
    to_id: Option<i64>,
    #[serde(default)]
    string: Option<RawString>,
}

// The store uses 0 for "no endpoint".
fn endpoint(raw: Option<i64>) -> Option<LinkId> {
    raw.filter(|id| *id != 0).map(LinkId)
}

impl From<RawLink> for Link {
    fn from(raw: RawLink) -> Self {
        Link {
            id: LinkId(raw.id),
            type_id: LinkId(raw.type_id),
            from_id: endpoint(raw.from_id),
            to_id: endpoint(raw.to_id),
            value: raw.string.and_then(|s| s.value),
        }
    }
}

pub fn decode_links(rows: &Value) -> Result<Vec<Link>, ProtocolError> {
    let raw: Vec<RawLink> = serde_json::from_value(rows.clone())?;
    Ok(raw.into_iter().map(Link::from).collect())
}

pub fn decode_selected(data: &Value) -> Result<Vec<Link>, ProtocolError> {
    decode_links(data.get("links").ok_or(ProtocolError::MissingField("links"))?)
}

pub fn decode_inserted(data: &Value) -> Result<Vec<Link>, ProtocolError> {
    let rows = data
        .pointer("/insert_links/returning")
        .ok_or(ProtocolError::MissingField("insert_links.returning"))?;
    decode_links(rows)
}

pub fn decode_deleted(data: &Value) -> Result<u64, ProtocolError> {
    data.pointer("/delete_links/affected_rows")
        .and_then(Value::as_u64)
        .ok_or(ProtocolError::MissingField("delete_links.affected_rows"))
}

/// `None` when the name is not registered.
pub fn decode_resolved(data: &Value) -> Result<Option<LinkId>, ProtocolError> {
    let rows = data
        .get("links")
        .and_then(Value::as_array)
        .ok_or(ProtocolError::MissingField("links"))?;
    Ok(rows
        .first()
        .and_then(|row| row.get("to_id"))
        .and_then(Value::as_i64)
        .and_then(|id| endpoint(Some(id))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    #[serde(default)]
    link_id: Option<i64>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode the payload of the `guest` or `jwt` action.
pub fn decode_session(data: &Value, field: &'static str) -> Result<Session, ProtocolError> {
    let payload = data.get(field).ok_or(ProtocolError::MissingField(field))?;
    let raw: RawSession = serde_json::from_value(payload.clone())?;
    if let Some(error) = raw.error {
        return Err(ProtocolError::Graphql(error));
    }
    let link_id = raw.link_id.ok_or(ProtocolError::MissingField("linkId"))?;
    Ok(Session::new(LinkId(link_id), raw.token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_delete_filter_encoding() {
        let filter = LinkFilter::new().up(
            LinkId(30),
            LinkFilter::of_type(LinkId(1))
                .from_id(LinkId(100))
                .to_matching(LinkFilter::of_type(LinkId(7)).to_id(LinkId(55))),
        );
        assert_eq!(
            bool_exp(&filter),
            json!({
                "up": {
                    "tree_id": { "_eq": 30 },
                    "parent": {
                        "type_id": { "_eq": 1 },
                        "from_id": { "_eq": 100 },
                        "to": { "type_id": { "_eq": 7 }, "to_id": { "_eq": 55 } }
                    }
                }
            })
        );
    }

    #[test]
    fn test_value_and_incoming_encoding() {
        let filter = LinkFilter::of_type(LinkId(4))
            .value("/ws/demo/a.ts")
            .incoming(LinkFilter::of_type(LinkId(1)).from_id(LinkId(12)));
        assert_eq!(
            bool_exp(&filter),
            json!({
                "type_id": { "_eq": 4 },
                "string": { "value": { "_eq": "/ws/demo/a.ts" } },
                "in": { "type_id": { "_eq": 1 }, "from_id": { "_eq": 12 } }
            })
        );
    }

    #[test]
    fn test_insert_object_nests_container() {
        let link = NewLink::node(LinkId(4))
            .with_value("demo")
            .contained_in(LinkId(1), LinkId(100));
        assert_eq!(
            insert_object(&link),
            json!({
                "type_id": 4,
                "string": { "data": { "value": "demo" } },
                "in": { "data": [{ "type_id": 1, "from_id": 100 }] }
            })
        );
    }

    #[test]
    fn test_decode_links_treats_zero_as_absent() {
        let rows = json!([
            { "id": 5, "type_id": 4, "from_id": 0, "to_id": 0, "string": { "value": "demo" } },
            { "id": 6, "type_id": 7, "from_id": 100, "to_id": 5, "string": null }
        ]);
        let links = decode_links(&rows).unwrap();
        assert_eq!(links[0].from_id, None);
        assert_eq!(links[0].value.as_deref(), Some("demo"));
        assert_eq!(links[1].from_id, Some(LinkId(100)));
        assert_eq!(links[1].to_id, Some(LinkId(5)));
        assert_eq!(links[1].value, None);
    }

    #[test]
    fn test_envelope_errors() {
        let err = decode_envelope(json!({
            "errors": [{ "message": "denied" }, { "message": "again" }]
        }))
        .unwrap_err();
        assert!(matches!(err, ProtocolError::Graphql(ref m) if m == "denied; again"));

        let data =
            decode_envelope(json!({ "data": { "delete_links": { "affected_rows": 2 } } })).unwrap();
        assert_eq!(decode_deleted(&data).unwrap(), 2);

        assert!(matches!(
            decode_envelope(json!({})),
            Err(ProtocolError::MissingField("data"))
        ));
    }

    #[test]
    fn test_decode_resolved() {
        assert_eq!(
            decode_resolved(&json!({ "links": [{ "to_id": 42 }] })).unwrap(),
            Some(LinkId(42))
        );
        assert_eq!(decode_resolved(&json!({ "links": [] })).unwrap(), None);
    }

    #[test]
    fn test_decode_session() {
        let data = json!({ "jwt": { "linkId": 380, "token": "abc", "error": null } });
        let session = decode_session(&data, "jwt").unwrap();
        assert_eq!(session.link_id, LinkId(380));
        assert_eq!(session.token.as_deref(), Some("abc"));

        let denied = json!({ "jwt": { "linkId": null, "token": null, "error": "forbidden" } });
        assert!(matches!(
            decode_session(&denied, "jwt"),
            Err(ProtocolError::Graphql(_))
        ));
    }
}
