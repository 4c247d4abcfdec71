use super::resource::{Embedded, Resource};
use crate::transport::Response;

/// What a navigation step produced.
#[derive(Debug, Clone)]
pub enum Data {
    Resource(Resource),
    /// An embedded array served without a request.
    Collection(Vec<Resource>),
    /// A body that was not a JSON object, or `""` for `204 No Content`.
    Text(String),
}

impl Data {
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Data::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Data::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Resource]> {
        match self {
            Data::Collection(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Embedded> for Data {
    fn from(embedded: Embedded) -> Self {
        match embedded {
            Embedded::One(resource) => Data::Resource(resource),
            Embedded::Many(items) => Data::Collection(items),
        }
    }
}

/// Outcome of a homepage load, an action fetch or an embedded lookup.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Name of the action that ran; `None` for the homepage and for
    /// embedded data.
    pub action: Option<String>,
    pub data: Data,
    /// The response behind `data`, absent when nothing was requested.
    pub xhr: Option<Response>,
}

impl FetchResult {
    pub(crate) fn from_embedded(embedded: Embedded) -> Self {
        FetchResult {
            action: None,
            data: embedded.into(),
            xhr: None,
        }
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.data.as_resource()
    }
}
