use std::fmt;

/// Generate the `MediaType` enum, its `Display` implementation, and
/// the associated constant `ALL` with all the valid values.
macro_rules! media_types {
    ($($variant:ident = $mediatype:expr,)*) => {
        /// Manifest media types accepted from a registry.
        #[non_exhaustive]
        #[derive(Copy, Clone, PartialEq, Debug)]
        pub enum MediaType {
            $(
                #[doc = concat!("Variant for `", $mediatype, "`.")]
                $variant,
            )*
        }

        impl MediaType {
            /// List with all known media types.
            pub const ALL: &[&str] = &[ $($mediatype),* ];

            /// Variants in the same order as [`ALL`][Self::ALL].
            pub const VARIANTS: &[MediaType] = &[ $(MediaType::$variant),* ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(MediaType::$variant => $mediatype,)*
                }
            }
        }

        impl fmt::Display for MediaType {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    }
}

media_types!(
    DockerManifestList = "application/vnd.docker.distribution.manifest.list.v2+json",
    DockerManifestV2 = "application/vnd.docker.distribution.manifest.v2+json",
    OciImageIndex = "application/vnd.oci.image.index.v1+json",
    OciManifestV1 = "application/vnd.oci.image.manifest.v1+json",
);

impl MediaType {
    /// Value for the `Accept` header of a manifest request.
    ///
    /// # Examples
    ///
    /// ```
    /// # use manifest_locator::*;
    /// let accept = MediaType::accept_header();
    /// assert!(accept.contains("application/vnd.oci.image.index.v1+json"));
    /// ```
    pub fn accept_header() -> String {
        Self::ALL.join(", ")
    }
}

#[test]
fn media_type_strings() {
    assert_eq!(MediaType::VARIANTS.len(), MediaType::ALL.len());
    for (variant, mediatype) in MediaType::VARIANTS.iter().zip(MediaType::ALL) {
        assert_eq!(variant.as_str(), *mediatype);
        assert_eq!(variant.to_string(), *mediatype);
    }

    assert_eq!(
        MediaType::OciManifestV1.as_str(),
        "application/vnd.oci.image.manifest.v1+json"
    );

    assert_eq!(
        MediaType::accept_header().split(", ").collect::<Vec<_>>(),
        MediaType::ALL
    );
}
