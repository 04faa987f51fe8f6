use std::collections::HashSet;

/// 收集到的一条列表项（如联系人），身份即去掉首尾空白后的名字
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub name: String,
}

impl Entry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
        }
    }
}

/// 按发现顺序累积条目，同名只收一次
#[derive(Debug, Default)]
pub struct EntryAccumulator {
    accumulated: Vec<Entry>,
    seen_names: HashSet<String>,
}

impl EntryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回本批中新加入的条目，保持原有相对顺序
    pub fn add(&mut self, candidates: Vec<Entry>) -> Vec<Entry> {
        let mut added = Vec::new();

        for candidate in candidates {
            let entry = Entry::new(&candidate.name);
            if self.seen_names.insert(entry.name.clone()) {
                self.accumulated.push(entry.clone());
                added.push(entry);
            }
        }

        added
    }

    pub fn entries(&self) -> &[Entry] {
        &self.accumulated
    }

    pub fn len(&self) -> usize {
        self.accumulated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated.is_empty()
    }

    /// 两份集合必须一致，否则说明状态被破坏
    pub fn is_consistent(&self) -> bool {
        self.accumulated.len() == self.seen_names.len()
            && self
                .accumulated
                .iter()
                .all(|entry| self.seen_names.contains(&entry.name))
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.accumulated
    }
}
