use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{
    decoder::SliceDecoder,
    enums::SelectionMode,
    error::TriageError,
    warnings::Warnings,
};

/// A slice file whose header has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceFile {
    pub path: PathBuf,
    pub series_id: String,
    /// Missing InstanceNumbers are stored as 0, which moves such slices to
    /// the front of their series.
    pub instance_number: i32,
}

/// Slices sharing one SeriesInstanceUID, sorted by instance number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    series_id: String,
    slices: Vec<SliceFile>,
}

impl Series {
    /// Returns `None` for an empty slice list or when the slices belong to
    /// different series.
    pub fn new(mut slices: Vec<SliceFile>) -> Option<Self> {
        let series_id = slices.first()?.series_id.clone();
        if slices.iter().any(|slice| slice.series_id != series_id) {
            return None;
        }
        // Stable: equal instance numbers keep their input order.
        slices.sort_by_key(|slice| slice.instance_number);
        Some(Self { series_id, slices })
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn slices(&self) -> &[SliceFile] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

pub struct SeriesSelector;

impl SeriesSelector {
    /// Collect every regular file below `root`, following symlinks, sorted
    /// by path.
    ///
    /// DICOM files frequently come without an extension, so no filter is
    /// applied. Whatever is not DICOM is rejected when its header is read.
    /// Entries that cannot be read below `root` are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`TriageError::Io`] only when `root` itself cannot be read.
    pub fn collect_paths(
        root: impl AsRef<Path>,
        warnings: &mut Warnings,
    ) -> Result<Vec<PathBuf>, TriageError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => paths.push(entry.into_path()),
                Ok(_) => {}
                Err(error) if error.depth() == 0 => return Err(io::Error::from(error).into()),
                Err(error) => {
                    let path = error
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    warnings.push(format_args!("{path}: skipped while listing ({error})"));
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Read headers and group the files by series id.
    ///
    /// Unreadable headers are skipped with a warning. The groups come back
    /// ordered by series id, each sorted by instance number.
    pub fn group<D: SliceDecoder + ?Sized>(
        decoder: &D,
        paths: &[PathBuf],
        warnings: &mut Warnings,
    ) -> Vec<Series> {
        let headers: Vec<_> = paths
            .par_iter()
            .map(|path| decoder.read_header(path).map(|header| (path, header)))
            .collect();

        let mut groups: BTreeMap<String, Vec<SliceFile>> = BTreeMap::new();
        for result in headers {
            match result {
                Ok((path, header)) => {
                    groups
                        .entry(header.series_id.clone())
                        .or_default()
                        .push(SliceFile {
                            path: path.clone(),
                            series_id: header.series_id,
                            instance_number: header.instance_number.unwrap_or(0),
                        });
                }
                Err(error) => warnings.push(error),
            }
        }

        groups.into_values().filter_map(Series::new).collect()
    }

    /// Group the files and pick the series to analyse.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::NoReadableSeries`] if no file had a readable
    /// header with a series id.
    pub fn select<D: SliceDecoder + ?Sized>(
        decoder: &D,
        paths: &[PathBuf],
        mode: SelectionMode,
        warnings: &mut Warnings,
    ) -> Result<Vec<Series>, TriageError> {
        let groups = Self::group(decoder, paths, warnings);
        log::info!(
            "Found {} series in {} files",
            groups.len(),
            paths.len()
        );

        match mode {
            SelectionMode::Single => Self::largest(groups)
                .map(|series| vec![series])
                .ok_or(TriageError::NoReadableSeries),
            SelectionMode::Multi if groups.is_empty() => Err(TriageError::NoReadableSeries),
            SelectionMode::Multi => Ok(groups),
        }
    }

    /// The series with the most files. Groups arrive in ascending id order
    /// and only a strictly larger series replaces the current pick, so ties
    /// go to the smallest id.
    fn largest(groups: Vec<Series>) -> Option<Series> {
        groups.into_iter().fold(None, |best, series| match best {
            Some(best) if best.len() >= series.len() => Some(best),
            _ => Some(series),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use super::*;
    use crate::decoder::{DecodeError, SliceHeader, SlicePixels};

    struct HeaderTable(HashMap<PathBuf, Option<SliceHeader>>);

    impl HeaderTable {
        fn new(entries: &[(&str, Option<(&str, Option<i32>)>)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(path, header)| {
                        let header = header.map(|(series_id, instance_number)| SliceHeader {
                            series_id: series_id.to_string(),
                            instance_number,
                        });
                        (PathBuf::from(path), header)
                    })
                    .collect(),
            )
        }

        fn paths(&self) -> Vec<PathBuf> {
            let mut paths: Vec<_> = self.0.keys().cloned().collect();
            paths.sort();
            paths
        }
    }

    impl SliceDecoder for HeaderTable {
        fn read_header(&self, path: &Path) -> Result<SliceHeader, DecodeError> {
            self.0
                .get(path)
                .cloned()
                .flatten()
                .ok_or_else(|| DecodeError::header(path, "not a DICOM file"))
        }

        fn read_pixels(&self, path: &Path) -> Result<SlicePixels, DecodeError> {
            Err(DecodeError::pixels(path, "headers only"))
        }
    }

    type Entry = (String, Option<(String, Option<i32>)>);

    fn series_of(prefix: &str, series_id: &str, count: usize) -> Vec<Entry> {
        (0..count)
            .map(|i| {
                (
                    format!("{prefix}/{i:03}"),
                    Some((series_id.to_string(), Some(i as i32 + 1))),
                )
            })
            .collect()
    }

    fn table(entries: &[Entry]) -> HeaderTable {
        let borrowed: Vec<_> = entries
            .iter()
            .map(|(path, header)| {
                (
                    path.as_str(),
                    header.as_ref().map(|(id, number)| (id.as_str(), *number)),
                )
            })
            .collect();
        HeaderTable::new(&borrowed)
    }

    #[test]
    fn single_mode_picks_largest_series() {
        let mut entries = series_of("a", "1.2.small", 10);
        entries.extend(series_of("b", "1.2.large", 30));
        let decoder = table(&entries);
        let mut warnings = Warnings::default();

        let selected =
            SeriesSelector::select(&decoder, &decoder.paths(), SelectionMode::Single, &mut warnings)
                .unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].series_id(), "1.2.large");
        assert_eq!(selected[0].len(), 30);
        assert!(warnings.is_empty());
    }

    #[test]
    fn single_mode_tie_goes_to_smallest_id() {
        let mut entries = series_of("a", "1.3", 5);
        entries.extend(series_of("b", "1.10", 5));
        entries.extend(series_of("c", "1.2", 5));
        let decoder = table(&entries);

        let selected = SeriesSelector::select(
            &decoder,
            &decoder.paths(),
            SelectionMode::Single,
            &mut Warnings::default(),
        )
        .unwrap();

        assert_eq!(selected[0].series_id(), "1.10");
    }

    #[test]
    fn multi_mode_returns_every_series_in_id_order() {
        let mut entries = series_of("a", "1.3", 2);
        entries.extend(series_of("b", "1.1", 4));
        let decoder = table(&entries);

        let selected = SeriesSelector::select(
            &decoder,
            &decoder.paths(),
            SelectionMode::Multi,
            &mut Warnings::default(),
        )
        .unwrap();

        let ids: Vec<_> = selected.iter().map(Series::series_id).collect();
        assert_eq!(ids, ["1.1", "1.3"]);
    }

    #[test]
    fn unreadable_headers_become_warnings() {
        let decoder = HeaderTable::new(&[
            ("scan/1", Some(("1.2", Some(1)))),
            ("scan/README", None),
            ("scan/2", Some(("1.2", Some(2)))),
        ]);
        let mut warnings = Warnings::default();

        let selected =
            SeriesSelector::select(&decoder, &decoder.paths(), SelectionMode::Single, &mut warnings)
                .unwrap();

        assert_eq!(selected[0].len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.as_slice()[0].contains("scan/README"));
    }

    #[test]
    fn no_readable_header_is_fatal() {
        let decoder = HeaderTable::new(&[("x", None), ("y", None)]);
        let mut warnings = Warnings::default();

        let result =
            SeriesSelector::select(&decoder, &decoder.paths(), SelectionMode::Multi, &mut warnings);

        assert!(matches!(result, Err(TriageError::NoReadableSeries)));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn slices_sorted_by_instance_number_missing_first() {
        let decoder = HeaderTable::new(&[
            ("s/a", Some(("1.2", Some(3)))),
            ("s/b", Some(("1.2", Some(1)))),
            ("s/c", Some(("1.2", None))),
            ("s/d", Some(("1.2", Some(2)))),
        ]);

        let groups = SeriesSelector::group(&decoder, &decoder.paths(), &mut Warnings::default());

        let order: Vec<_> = groups[0]
            .slices()
            .iter()
            .map(|slice| slice.path.to_str().unwrap())
            .collect();
        assert_eq!(order, ["s/c", "s/b", "s/d", "s/a"]);
        assert_eq!(groups[0].slices()[0].instance_number, 0);
    }

    #[test]
    fn series_rejects_mixed_ids() {
        let slice = |id: &str| SliceFile {
            path: PathBuf::from(id),
            series_id: id.to_string(),
            instance_number: 1,
        };
        assert!(Series::new(vec![slice("a"), slice("b")]).is_none());
        assert!(Series::new(Vec::new()).is_none());
    }

    #[test]
    fn collects_nested_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/b"), b"").unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();
        let mut warnings = Warnings::default();

        let paths = SeriesSelector::collect_paths(dir.path(), &mut warnings).unwrap();

        assert_eq!(
            paths,
            vec![dir.path().join("a"), dir.path().join("nested/b")]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            SeriesSelector::collect_paths(dir.path().join("absent"), &mut Warnings::default());
        assert!(matches!(result, Err(TriageError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_files_and_directories() {
        use std::os::unix::fs::symlink;

        let store = tempfile::tempdir().unwrap();
        fs::create_dir(store.path().join("series")).unwrap();
        fs::write(store.path().join("series/1"), b"").unwrap();
        fs::write(store.path().join("2"), b"").unwrap();

        let study = tempfile::tempdir().unwrap();
        symlink(store.path().join("2"), study.path().join("slice")).unwrap();
        symlink(store.path().join("series"), study.path().join("linked")).unwrap();
        let mut warnings = Warnings::default();

        let paths = SeriesSelector::collect_paths(study.path(), &mut warnings).unwrap();

        assert_eq!(
            paths,
            vec![study.path().join("linked/1"), study.path().join("slice")]
        );
        assert!(warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_a_warning() {
        use std::os::unix::fs::symlink;

        let study = tempfile::tempdir().unwrap();
        fs::write(study.path().join("a"), b"").unwrap();
        symlink(study.path().join("gone"), study.path().join("b")).unwrap();
        let mut warnings = Warnings::default();

        let paths = SeriesSelector::collect_paths(study.path(), &mut warnings).unwrap();

        assert_eq!(paths, vec![study.path().join("a")]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.as_slice()[0].contains("skipped while listing"));
    }
}
