//! Exported-vs-private accounting across the implementation tree.
//!
//! Builds a package → surface entry map so reports can show which packages
//! consumers can reach and which stay implementation-private.

use crate::boundary::ModuleBoundary;
use crate::descriptor::{PackageName, Visibility};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Whether a package is exported, to whom, and whether that is settled.
pub struct SurfaceEntry {
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub provisional: bool,
}

/// Map every implementation package to its surface entry.
///
/// Exports naming packages outside the tree are left out; validation reports
/// those separately.
pub fn build_surface_map(boundary: &ModuleBoundary) -> BTreeMap<PackageName, SurfaceEntry> {
    boundary
        .tree()
        .packages()
        .map(|package| {
            let entry = match boundary.export_for(package) {
                Some(export) => SurfaceEntry {
                    exported: true,
                    visibility: Some(export.visibility.clone()),
                    provisional: !export.stable(),
                },
                None => SurfaceEntry {
                    exported: false,
                    visibility: None,
                    provisional: false,
                },
            };
            (package.clone(), entry)
        })
        .collect()
}

/// Packages consumers cannot reach.
pub fn private_packages(surface: &BTreeMap<PackageName, SurfaceEntry>) -> Vec<&PackageName> {
    surface
        .iter()
        .filter(|(_, entry)| !entry.exported)
        .map(|(package, _)| package)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::parse_module_info;
    use crate::package_tree::PackageTree;

    #[test]
    fn internal_packages_stay_private() {
        let descriptor = parse_module_info(
            "module m {\n    exports m.api;\n    // TODO decide\n    exports m.spi to m.plugins;\n    exports m.ghost;\n}",
        )
        .unwrap();
        let tree = PackageTree::from_names(
            ["m.api", "m.spi", "m.internal"]
                .into_iter()
                .map(|name| PackageName::new(name).unwrap()),
        );
        let boundary = ModuleBoundary::from_descriptor(descriptor, tree);
        let surface = build_surface_map(&boundary);

        assert_eq!(surface.len(), 3);
        let spi = &surface[&PackageName::new("m.spi").unwrap()];
        assert!(spi.exported && spi.provisional);
        assert!(matches!(spi.visibility, Some(Visibility::RestrictedTo(_))));

        let private: Vec<&str> = private_packages(&surface)
            .into_iter()
            .map(PackageName::as_str)
            .collect();
        assert_eq!(private, ["m.internal"]);

        let json = serde_json::to_value(&surface).unwrap();
        assert_eq!(json["m.api"]["visibility"], "public");
        assert!(json["m.internal"].get("visibility").is_none());
    }
}
