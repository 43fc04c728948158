//! In-memory action tree of a workflow.
//!
//! The backend returns a workflow's actions as a flat list in which each
//! action names its predecessor. This module rebuilds the tree from that
//! list and keeps it consistent while actions are appended, edited and
//! removed:
//! - an action under a non-condition parent is chained into `children`
//! - an action under a condition goes to `yes_branch` or `no_branch`,
//!   according to the branch tag stored in its payload
//! - actions that cannot be placed are left out and reported

use std::{collections::HashMap, fmt};

use petgraph::{
    algo::kosaraju_scc,
    graph::{DiGraph, NodeIndex},
    visit::Dfs,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    MailflowError, Result,
    model::ActionModel,
    workflow::{
        action::{Action, ActionId, Branch, ROOT_PARENT_ID},
        payload::ActionPayload,
    },
};

/// Which actions a flattening or completeness check covers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scope {
    /// roots and their `children` chains; condition branches are left out
    #[default]
    Trunk,
    /// everything, branches included
    Full,
}

/// Why an action was left out of, or misplaced in, a rebuilt tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// a second action with an id already seen; the first one is kept
    DuplicateId {
        id: ActionId,
    },
    /// the parent id does not match any action of the workflow
    MissingParent {
        id: ActionId,
        parent_id: ActionId,
    },
    /// the parent is a condition but the action has no valid branch tag
    InvalidBranch {
        id: ActionId,
        parent_id: ActionId,
        branch: Option<String>,
    },
    /// branch tag on an action whose parent is neither a condition nor on
    /// that same branch; kept as a child
    UnexpectedBranch {
        id: ActionId,
        parent_id: ActionId,
    },
    /// the ancestor chain loops and never reaches a root
    Cycle {
        id: ActionId,
    },
    /// the parent was itself left out, so this action is left out too
    Unreachable {
        id: ActionId,
        parent_id: ActionId,
    },
    /// the data string could not be read; the payload was left empty
    MalformedPayload {
        id: ActionId,
        error: String,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            BuildWarning::DuplicateId {
                id,
            } => write!(f, "duplicate action id {}", id),
            BuildWarning::MissingParent {
                id,
                parent_id,
            } => write!(f, "action {} references missing parent {}", id, parent_id),
            BuildWarning::InvalidBranch {
                id,
                parent_id,
                branch,
            } => write!(f, "action {} under condition {} has invalid branch {:?}", id, parent_id, branch),
            BuildWarning::UnexpectedBranch {
                id,
                parent_id,
            } => write!(f, "action {} has a branch tag but parent {} is not a condition", id, parent_id),
            BuildWarning::Cycle {
                id,
            } => write!(f, "action {} is part of a parent cycle", id),
            BuildWarning::Unreachable {
                id,
                parent_id,
            } => write!(f, "action {} hangs off dropped action {}", id, parent_id),
            BuildWarning::MalformedPayload {
                id,
                error,
            } => write!(f, "action {} has malformed data: {}", id, error),
        }
    }
}

/// Warnings collected while rebuilding a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub warnings: Vec<BuildWarning>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn push(
        &mut self,
        warning: BuildWarning,
    ) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Where a placed action hangs under its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Child,
    Branch(Branch),
}

/// Id a new action appended to `chain` must reference as its parent:
/// the chain's tail, or `head` when the chain is empty.
///
/// A reloaded chain nests each link in the `children` of the one before,
/// so the tail is found by following the last child down from the last
/// element.
pub fn chain_parent_id(
    chain: &[Action],
    head: &str,
) -> ActionId {
    let Some(mut tail) = chain.last() else {
        return head.to_string();
    };
    while let Some(next) = tail.children.last() {
        tail = next;
    }
    tail.id.clone()
}

/// Appends `action` to the end of `chain`, linking it to the chain's tail.
///
/// `head` is the id of the node owning the chain; it becomes the parent
/// when the chain is empty.
pub fn append_to_chain(
    chain: &mut Vec<Action>,
    head: &str,
    mut action: Action,
) {
    action.parent_id = Some(chain_parent_id(chain, head));
    chain.push(action);
}

/// Forest of actions rebuilt from a workflow's flat action list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionTree {
    roots: Vec<Action>,
}

impl ActionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the forest from the backend's flat list.
    ///
    /// Roots and siblings keep their input order. Actions that cannot be
    /// placed are dropped and listed in the returned [`BuildReport`].
    pub fn build(models: &[ActionModel]) -> (Self, BuildReport) {
        let mut report = BuildReport::default();

        let mut nodes: Vec<Option<Action>> = Vec::with_capacity(models.len());
        let mut raw_branches: Vec<Option<String>> = Vec::with_capacity(models.len());
        let mut index: HashMap<ActionId, usize> = HashMap::new();

        for model in models {
            let (action, parsed) = Action::from_model(model);
            if let Some(error) = parsed.error {
                report.push(BuildWarning::MalformedPayload {
                    id: action.id.clone(),
                    error,
                });
            }
            if !action.id.is_empty() {
                if index.contains_key(&action.id) {
                    report.push(BuildWarning::DuplicateId {
                        id: action.id.clone(),
                    });
                    continue;
                }
                index.insert(action.id.clone(), nodes.len());
            }
            nodes.push(Some(action));
            raw_branches.push(parsed.branch_raw);
        }

        let mut graph: DiGraph<usize, Slot> = DiGraph::with_capacity(nodes.len(), nodes.len());
        let graph_idx: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();

        let mut roots = Vec::new();
        let mut placed: Vec<Vec<(usize, Slot)>> = vec![Vec::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            let Some(action) = node else {
                continue;
            };
            let Some(parent_id) = &action.parent_id else {
                roots.push(i);
                continue;
            };
            let Some(&parent) = index.get(parent_id) else {
                report.push(BuildWarning::MissingParent {
                    id: action.id.clone(),
                    parent_id: parent_id.clone(),
                });
                continue;
            };
            let parent_is_condition = nodes[parent].as_ref().is_some_and(Action::is_condition);

            let slot = if parent_is_condition {
                match action.branch {
                    Some(branch) => Slot::Branch(branch),
                    None => {
                        report.push(BuildWarning::InvalidBranch {
                            id: action.id.clone(),
                            parent_id: parent_id.clone(),
                            branch: raw_branches[i].clone(),
                        });
                        continue;
                    }
                }
            } else {
                // later actions of a branch chain repeat the tag of the one before
                let parent_branch = nodes[parent].as_ref().and_then(|p| p.branch);
                if action.branch.is_some() && action.branch != parent_branch {
                    report.push(BuildWarning::UnexpectedBranch {
                        id: action.id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
                Slot::Child
            };

            placed[parent].push((i, slot));
            graph.add_edge(graph_idx[parent], graph_idx[i], slot);
        }

        // A placed action no root reaches hangs off a cycle or a dropped action.
        let mut reachable = vec![false; nodes.len()];
        for &root in &roots {
            let mut dfs = Dfs::new(&graph, graph_idx[root]);
            while let Some(nx) = dfs.next(&graph) {
                reachable[graph[nx]] = true;
            }
        }
        let mut in_cycle = vec![false; nodes.len()];
        for scc in kosaraju_scc(&graph) {
            if scc.len() > 1 || scc.iter().any(|&nx| graph.contains_edge(nx, nx)) {
                for nx in scc {
                    in_cycle[graph[nx]] = true;
                }
            }
        }
        let mut parent_of: Vec<Option<usize>> = vec![None; nodes.len()];
        for (parent, slots) in placed.iter().enumerate() {
            for &(child, _) in slots {
                parent_of[child] = Some(parent);
            }
        }
        for i in 0..nodes.len() {
            if reachable[i] {
                continue;
            }
            let (Some(action), Some(parent)) = (&nodes[i], parent_of[i]) else {
                continue;
            };
            if in_cycle[i] {
                report.push(BuildWarning::Cycle {
                    id: action.id.clone(),
                });
            } else if let Some(parent) = &nodes[parent] {
                report.push(BuildWarning::Unreachable {
                    id: action.id.clone(),
                    parent_id: parent.id.clone(),
                });
            }
        }

        let mut forest = Vec::with_capacity(roots.len());
        let mut built: Vec<Option<Action>> = vec![None; nodes.len()];
        for root in roots {
            if let Some(action) = Self::assemble(root, &mut nodes, &mut built, &placed) {
                forest.push(action);
            }
        }

        (
            Self {
                roots: forest,
            },
            report,
        )
    }

    /// Moves the subtree rooted at `root` out of `nodes`.
    ///
    /// Nodes are assembled in reverse preorder so every child is complete
    /// before it is attached; `built` holds finished subtrees meanwhile.
    fn assemble(
        root: usize,
        nodes: &mut [Option<Action>],
        built: &mut [Option<Action>],
        placed: &[Vec<(usize, Slot)>],
    ) -> Option<Action> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(placed[i].iter().map(|&(child, _)| child));
        }

        for &i in order.iter().rev() {
            let Some(mut action) = nodes[i].take() else {
                continue;
            };
            for &(child, slot) in &placed[i] {
                let Some(child_action) = built[child].take() else {
                    continue;
                };
                match slot {
                    Slot::Child => action.children.push(child_action),
                    Slot::Branch(branch) => action.branch_mut(branch).push(child_action),
                }
            }
            built[i] = Some(action);
        }
        built[root].take()
    }

    pub fn roots(&self) -> &[Action] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of actions in the tree, branches included.
    pub fn len(&self) -> usize {
        self.flatten(Scope::Full).len()
    }

    /// Preorder listing of the tree for display.
    ///
    /// With [`Scope::Trunk`] each root is followed by its `children`
    /// subtree and condition branches are skipped. With [`Scope::Full`] a
    /// node's `yes_branch` and then `no_branch` follow its `children`.
    pub fn flatten(
        &self,
        scope: Scope,
    ) -> Vec<&Action> {
        let mut out = Vec::new();
        let mut stack: Vec<&Action> = self.roots.iter().rev().collect();
        while let Some(action) = stack.pop() {
            out.push(action);
            if scope == Scope::Full {
                stack.extend(action.no_branch.iter().rev());
                stack.extend(action.yes_branch.iter().rev());
            }
            stack.extend(action.children.iter().rev());
        }
        out
    }

    pub fn find(
        &self,
        id: &str,
    ) -> Option<&Action> {
        self.flatten(Scope::Full).into_iter().find(|a| a.id == id)
    }

    pub fn find_mut(
        &mut self,
        id: &str,
    ) -> Option<&mut Action> {
        let mut stack: Vec<&mut Action> = self.roots.iter_mut().rev().collect();
        while let Some(action) = stack.pop() {
            if action.id == id {
                return Some(action);
            }
            let Action {
                children,
                yes_branch,
                no_branch,
                ..
            } = action;
            stack.extend(no_branch.iter_mut().rev());
            stack.extend(yes_branch.iter_mut().rev());
            stack.extend(children.iter_mut().rev());
        }
        None
    }

    /// Parent id a new action must be created with.
    ///
    /// - parent and branch: the tail of that branch, or the condition itself
    ///   when the branch is empty
    /// - parent only: the parent
    /// - neither: the root sentinel
    pub fn resolve_parent_id(
        &self,
        parent: Option<&str>,
        branch: Option<Branch>,
    ) -> Result<ActionId> {
        match (parent, branch) {
            (None, None) => Ok(ROOT_PARENT_ID.to_string()),
            (None, Some(branch)) => Err(MailflowError::Action(format!("{} branch requires a condition parent", branch))),
            (Some(parent_id), branch) => {
                let parent = self.find(parent_id).ok_or_else(|| MailflowError::Action(format!("parent action {} not found", parent_id)))?;
                match branch {
                    Some(branch) if !parent.is_condition() => {
                        Err(MailflowError::Action(format!("{} branch requires a condition parent, {} is {}", branch, parent_id, parent.kind)))
                    }
                    Some(branch) => Ok(chain_parent_id(parent.branch(branch), &parent.id)),
                    None if parent.is_condition() => Err(MailflowError::Action(format!("condition {} takes actions only on its yes or no branch", parent_id))),
                    None => Ok(parent.id.clone()),
                }
            }
        }
    }

    /// Inserts a persisted action under `parent` (or at root level).
    pub fn insert(
        &mut self,
        parent: Option<&str>,
        branch: Option<Branch>,
        mut action: Action,
    ) -> Result<()> {
        let Some(parent_id) = parent else {
            if let Some(branch) = branch {
                return Err(MailflowError::Action(format!("{} branch requires a condition parent", branch)));
            }
            action.parent_id = None;
            self.roots.push(action);
            return Ok(());
        };
        let parent = self.find_mut(parent_id).ok_or_else(|| MailflowError::Action(format!("parent action {} not found", parent_id)))?;
        match branch {
            Some(branch) => {
                if !parent.is_condition() {
                    return Err(MailflowError::Action(format!("{} branch requires a condition parent, {} is {}", branch, parent_id, parent.kind)));
                }
                action.branch = Some(branch);
                let head = parent.id.clone();
                append_to_chain(parent.branch_mut(branch), &head, action);
            }
            None if parent.is_condition() => {
                return Err(MailflowError::Action(format!("condition {} takes actions only on its yes or no branch", parent_id)));
            }
            None => {
                action.parent_id = Some(parent.id.clone());
                parent.children.push(action);
            }
        }
        Ok(())
    }

    /// Replaces the payload of action `id`; placement is untouched.
    pub fn set_payload(
        &mut self,
        id: &str,
        payload: ActionPayload,
    ) -> Result<()> {
        let action = self.find_mut(id).ok_or_else(|| MailflowError::Action(format!("action {} not found", id)))?;
        if !payload.matches(&action.kind) {
            return Err(MailflowError::Action(format!("payload does not fit {} action {}", action.kind, id)));
        }
        action.payload = payload;
        Ok(())
    }

    /// Removes action `id` (with its subtree) from the container named by
    /// `parent`/`branch`: a branch of `parent`, the `children` of `parent`,
    /// or the root list.
    pub fn remove(
        &mut self,
        id: &str,
        parent: Option<&str>,
        branch: Option<Branch>,
    ) -> Result<Action> {
        let container = match (parent, branch) {
            (Some(parent_id), branch) => {
                let parent = self.find_mut(parent_id).ok_or_else(|| MailflowError::Action(format!("parent action {} not found", parent_id)))?;
                match branch {
                    Some(branch) => parent.branch_mut(branch),
                    None => &mut parent.children,
                }
            }
            (None, Some(branch)) => return Err(MailflowError::Action(format!("{} branch requires a condition parent", branch))),
            (None, None) => &mut self.roots,
        };
        let pos = container.iter().position(|a| a.id == id).ok_or_else(|| MailflowError::Action(format!("action {} not found in the given container", id)))?;
        Ok(container.remove(pos))
    }

    /// Whether every action in `scope` is complete.
    pub fn are_all_actions_complete(
        &self,
        scope: Scope,
    ) -> bool {
        self.flatten(scope).iter().all(|a| a.is_complete())
    }

    /// Actions in `scope` that still miss required fields.
    pub fn incomplete(
        &self,
        scope: Scope,
    ) -> Vec<&Action> {
        self.flatten(scope).into_iter().filter(|a| !a.is_complete()).collect()
    }

    /// Human-readable outline of the tree.
    pub fn schema(&self) -> String {
        let mut lines = vec!["=== Workflow Actions ===".to_string()];
        let mut stack: Vec<(&Action, usize, &str)> = self.roots.iter().rev().map(|a| (a, 0, "")).collect();
        while let Some((action, depth, label)) = stack.pop() {
            let status = if action.is_complete() {
                "complete"
            } else {
                "incomplete"
            };
            lines.push(format!("{}{}[{}] {} (type: {}, {})", "  ".repeat(depth), label, action.id, action.title, action.kind, status));
            stack.extend(action.no_branch.iter().rev().map(|a| (a, depth + 1, "no: ")));
            stack.extend(action.yes_branch.iter().rev().map(|a| (a, depth + 1, "yes: ")));
            stack.extend(action.children.iter().rev().map(|a| (a, depth, "")));
        }
        lines.join("\n")
    }
}

// Dropping nested actions link by link would recurse once per level.
impl Drop for ActionTree {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.roots);
        while let Some(mut action) = stack.pop() {
            stack.append(&mut action.children);
            stack.append(&mut action.yes_branch);
            stack.append(&mut action.no_branch);
        }
    }
}

impl TryFrom<&str> for ActionTree {
    type Error = MailflowError;

    fn try_from(json: &str) -> Result<Self> {
        let models = ActionModel::from_json(json)?;
        Ok(Self::build(&models).0)
    }
}
