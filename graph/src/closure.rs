//! Transitive closure over endpoint paths.

use crate::{AssocError, AssocResult, ObjectGraph};
use std::collections::HashSet;
use tether_core::{EndpointId, ObjectId};
use tether_registry::{ContentType, RelKind};

impl ObjectGraph {
    /// Objects reachable from `seeds` by repeatedly walking `path`.
    ///
    /// The path is cyclic: after its last endpoint the walk continues with
    /// the first one. Only objects reached at the start of the path are
    /// reported, seeds included, each once and in depth-first order. An
    /// empty path returns the seeds.
    pub fn closure(&self, seeds: &[ObjectId], path: &[EndpointId]) -> AssocResult<Vec<ObjectId>> {
        if path.is_empty() {
            return Ok(seeds.to_vec());
        }
        self.check_path(path)?;

        let next = |i: usize| (i + 1) % path.len();
        let mut seen: Vec<HashSet<ObjectId>> = vec![HashSet::new(); path.len()];
        let mut out = Vec::new();
        let mut stack = Vec::new();
        for &seed in seeds {
            stack.push((seed, 0));
            while let Some((x, i)) = stack.pop() {
                if !seen[i].insert(x) {
                    continue;
                }
                if i == 0 {
                    out.push(x);
                }
                // Push in reverse so the first linked object is visited first.
                for y in self.linked(x, path[i]).into_iter().rev() {
                    stack.push((y, next(i)));
                }
            }
        }
        Ok(out)
    }

    /// Follow the ONE endpoint `endpoint` from `seed` until it is unset or
    /// an object repeats. The seed comes first.
    pub fn chain(&self, seed: ObjectId, endpoint: EndpointId) -> AssocResult<Vec<ObjectId>> {
        let def = self
            .registry
            .get_endpoint(endpoint)
            .ok_or_else(|| AssocError::UnknownEndpoint {
                class: "<any>".to_string(),
                name: endpoint.to_string(),
            })?;
        if def.kind != RelKind::One {
            return Err(AssocError::WrongKind {
                endpoint: self.qualified_name(endpoint),
                expected: RelKind::One,
                actual: def.kind,
            });
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut current = Some(seed);
        while let Some(x) = current {
            if !seen.insert(x) {
                break;
            }
            out.push(x);
            current = self
                .store
                .extent(x, endpoint)
                .and_then(|e| e.as_singleton())
                .flatten();
        }
        Ok(out)
    }

    /// Every step must land on objects that carry the next endpoint.
    fn check_path(&self, path: &[EndpointId]) -> AssocResult<()> {
        for (i, &step) in path.iter().enumerate() {
            let to = path[(i + 1) % path.len()];
            let (Some(from_def), Some(to_def)) =
                (self.registry.get_endpoint(step), self.registry.get_endpoint(to))
            else {
                return Err(AssocError::UnknownEndpoint {
                    class: "<any>".to_string(),
                    name: format!("{} or {}", step, to),
                });
            };
            let lands = match &from_def.content {
                ContentType::Any => false,
                ContentType::Class(target) => self.registry.is_subclass(*target, to_def.owner),
                ContentType::OneOf(targets) => targets
                    .iter()
                    .all(|t| self.registry.is_subclass(*t, to_def.owner)),
            };
            if !lands {
                return Err(AssocError::PathMismatch {
                    from: self.qualified_name(step),
                    to: self.qualified_name(to),
                });
            }
        }
        Ok(())
    }
}
