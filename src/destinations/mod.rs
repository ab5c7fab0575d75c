use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Returns every strict ancestor of every folder in `folders`, i.e. each folder's path
/// prefixes from the top-level segment down to (but excluding) the folder itself.
pub fn destinations<I, P>(folders: I) -> BTreeSet<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut destinations = BTreeSet::new();
    for folder in folders {
        let mut prefix = PathBuf::new();
        let components = folder.as_ref().components().collect::<Vec<_>>();
        if let Some((_leaf, ancestors)) = components.split_last() {
            for component in ancestors {
                prefix.push(component);
                destinations.insert(prefix.clone());
            }
        }
    }
    destinations
}

/// Groups destinations by their top-level segment. Each top-level segment is always a key,
/// and maps to the remainder of every deeper destination beneath it.
pub fn group<'a, I>(destinations: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for destination in destinations {
        let mut components = destination.components();
        let Some(top) = components.next() else {
            continue;
        };
        let top = top.as_os_str().to_string_lossy().into_owned();
        let rest = components.as_path();
        let subpaths = grouped.entry(top).or_default();
        if !rest.as_os_str().is_empty() {
            subpaths.push(rest.to_string_lossy().into_owned());
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destinations_empty() {
        assert!(destinations(Vec::<PathBuf>::new()).is_empty());
    }

    #[test]
    fn destinations_exclude_leaf() {
        assert!(destinations(["Foo"]).is_empty());
        assert_eq!(
            destinations(["Movies/Foo [ABC123]"]),
            BTreeSet::from([PathBuf::from("Movies")])
        );
    }

    #[test]
    fn destinations_all_ancestors_deduplicated() {
        let result = destinations([
            "Shows/Bar/Season 1",
            "Shows/Bar/Season 2",
            "Shows/Baz",
            "Movies/Foo",
        ]);
        assert_eq!(
            result,
            BTreeSet::from([
                PathBuf::from("Movies"),
                PathBuf::from("Shows"),
                PathBuf::from("Shows/Bar"),
            ])
        );
    }

    #[test]
    fn destinations_sorted() {
        let result = destinations(["b/x", "a/y/z"])
            .into_iter()
            .collect::<Vec<_>>();
        assert_eq!(
            result,
            vec![
                PathBuf::from("a"),
                PathBuf::from("a/y"),
                PathBuf::from("b")
            ]
        );
    }

    #[test]
    fn group_by_top_level() {
        let dests = destinations([
            "Shows/Bar/Season 1/x",
            "Shows/Baz/y",
            "Movies/Foo",
        ]);
        assert_eq!(
            group(&dests),
            BTreeMap::from([
                ("Movies".to_owned(), vec![]),
                (
                    "Shows".to_owned(),
                    vec![
                        "Bar".to_owned(),
                        "Bar/Season 1".to_owned(),
                        "Baz".to_owned()
                    ]
                ),
            ])
        );
    }

    #[test]
    fn group_top_level_key_without_own_entry() {
        let dests = BTreeSet::from([PathBuf::from("Shows/Bar")]);
        assert_eq!(
            group(&dests),
            BTreeMap::from([("Shows".to_owned(), vec!["Bar".to_owned()])])
        );
    }
}
