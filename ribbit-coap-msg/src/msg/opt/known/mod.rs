/// Block-wise transfer option values
pub mod block;
pub use block::*;

/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Observe option values
pub mod observe;

macro_rules! opt {
  (#[doc = $doc:expr] $name:ident = $n:literal) => {
    #[doc = $doc]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
}

opt!(#[doc = "If-Match (repeatable)"]
     IF_MATCH = 1);
opt!(#[doc = "Uri-Host"]
     HOST = 3);
opt!(#[doc = "ETag (repeatable)"]
     ETAG = 4);
opt!(#[doc = "If-None-Match"]
     IF_NONE_MATCH = 5);
opt!(#[doc = "Observe (RFC 7641), see [`observe::Action`]"]
     OBSERVE = 6);
opt!(#[doc = "Uri-Port"]
     PORT = 7);
opt!(#[doc = "Location-Path (repeatable)"]
     LOCATION_PATH = 8);
opt!(#[doc = "Uri-Path (repeatable, one per path segment)"]
     PATH = 11);
opt!(#[doc = "Content-Format, see [`ContentFormat`]"]
     CONTENT_FORMAT = 12);
opt!(#[doc = "Max-Age"]
     MAX_AGE = 14);
opt!(#[doc = "Uri-Query (repeatable)"]
     QUERY = 15);
opt!(#[doc = "Accept, see [`ContentFormat`]"]
     ACCEPT = 17);
opt!(#[doc = "Location-Query (repeatable)"]
     LOCATION_QUERY = 20);
opt!(#[doc = "Block2 (RFC 7959), see [`Block`]"]
     BLOCK2 = 23);
opt!(#[doc = "Block1 (RFC 7959), see [`Block`]"]
     BLOCK1 = 27);
opt!(#[doc = "Proxy-Uri"]
     PROXY_URI = 35);
opt!(#[doc = "Proxy-Scheme"]
     PROXY_SCHEME = 39);
opt!(#[doc = "Size1"]
     SIZE1 = 60);

/// Human name of an option number, used when logging packets
pub fn name(n: crate::OptNumber) -> Option<&'static str> {
  let name = match n {
    | IF_MATCH => "If-Match",
    | HOST => "Uri-Host",
    | ETAG => "ETag",
    | IF_NONE_MATCH => "If-None-Match",
    | OBSERVE => "Observe",
    | PORT => "Uri-Port",
    | LOCATION_PATH => "Location-Path",
    | PATH => "Uri-Path",
    | CONTENT_FORMAT => "Content-Format",
    | MAX_AGE => "Max-Age",
    | QUERY => "Uri-Query",
    | ACCEPT => "Accept",
    | LOCATION_QUERY => "Location-Query",
    | BLOCK2 => "Block2",
    | BLOCK1 => "Block1",
    | PROXY_URI => "Proxy-Uri",
    | PROXY_SCHEME => "Proxy-Scheme",
    | SIZE1 => "Size1",
    | _ => return None,
  };

  Some(name)
}
