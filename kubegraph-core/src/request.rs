//! Request builder for arbitrary api types.
use crate::params::{ListParams, Patch};
use crate::{Error, Result};

pub(crate) const JSON_MIME: &str = "application/json";

/// An API request builder
///
/// Takes a resource url path and supplies constructors for the operations
/// the gateway translates GraphQL into. All constructors return
/// `http::Request` objects with relative URIs; the client stack fills in
/// scheme and authority.
#[derive(Debug, Clone)]
pub struct Request {
    /// The path component of a url
    pub url_path: String,
}

impl Request {
    /// New request with a resource's url path
    pub fn new<S: Into<String>>(url_path: S) -> Self {
        Self {
            url_path: url_path.into(),
        }
    }

    /// List a collection of a resource
    pub fn list(&self, lp: &ListParams) -> Result<http::Request<Vec<u8>>> {
        let target = format!("{}?", self.url_path);
        let mut qp = form_urlencoded::Serializer::new(target);
        lp.validate()?;
        lp.populate_qp(&mut qp);
        let urlstr = qp.finish();
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Watch a collection, optionally from a known resource version
    ///
    /// Without a resource version the server synthesizes `ADDED` events for
    /// the current state before streaming changes.
    pub fn watch(&self, lp: &ListParams, ver: Option<&str>) -> Result<http::Request<Vec<u8>>> {
        let target = format!("{}?", self.url_path);
        let mut qp = form_urlencoded::Serializer::new(target);
        lp.validate()?;
        qp.append_pair("watch", "true");
        lp.populate_qp(&mut qp);
        if let Some(ver) = ver {
            qp.append_pair("resourceVersion", ver);
        }
        let urlstr = qp.finish();
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Get a single instance
    pub fn get(&self, name: &str) -> Result<http::Request<Vec<u8>>> {
        let target = format!("{}/{}", self.url_path, name);
        let urlstr = form_urlencoded::Serializer::new(target).finish();
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Create an instance of a resource
    pub fn create(&self, data: Vec<u8>) -> Result<http::Request<Vec<u8>>> {
        let urlstr = format!("{}?", self.url_path);
        let req = http::Request::post(urlstr).header(http::header::CONTENT_TYPE, JSON_MIME);
        req.body(data).map_err(Error::BuildRequest)
    }

    /// Patch an instance of a resource
    pub fn patch<P: serde::Serialize>(
        &self,
        name: &str,
        patch: &Patch<P>,
    ) -> Result<http::Request<Vec<u8>>> {
        let target = format!("{}/{}?", self.url_path, name);
        let urlstr = form_urlencoded::Serializer::new(target).finish();
        http::Request::patch(urlstr)
            .header(http::header::ACCEPT, JSON_MIME)
            .header(http::header::CONTENT_TYPE, patch.content_type())
            .body(patch.serialize().map_err(Error::SerializeBody)?)
            .map_err(Error::BuildRequest)
    }

    /// Delete an instance of a resource
    pub fn delete(&self, name: &str) -> Result<http::Request<Vec<u8>>> {
        let target = format!("{}/{}?", self.url_path, name);
        let urlstr = form_urlencoded::Serializer::new(target).finish();
        let req = http::Request::delete(urlstr).header(http::header::CONTENT_TYPE, JSON_MIME);
        req.body(vec![]).map_err(Error::BuildRequest)
    }
}
