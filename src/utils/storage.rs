use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::marker::PhantomData;
use std::{fmt, mem};

/// Arena指针特性，所有IR对象的句柄都实现该特性
pub trait ArenaPtr: Copy + Eq + Hash {
    type Arena: Arena<Self>;
    /// 指针指向的数据类型
    type Data;

    /// 通过Arena解引用，指针无效时返回None
    fn deref(self, arena: &Self::Arena) -> Option<&Self::Data> {
        arena.deref(self)
    }

    /// 通过Arena解引用，返回可变引用，指针无效时返回None
    fn deref_mut(self, arena: &mut Self::Arena) -> Option<&mut Self::Data> {
        arena.deref_mut(self)
    }
}

/// Arena的分配与解引用特性
/// # 参数类型
/// - `Ptr`: Arena支持的指针类型
pub trait Arena<Ptr: ArenaPtr<Arena = Self>> {
    /// 分配指针并存入数据，f接收分配好的指针并构造数据，
    /// 便于数据内部记录自身的指针
    fn alloc_with<F>(&mut self, f: F) -> Ptr
    where
        F: FnOnce(Ptr) -> Ptr::Data;

    /// 将数据存入Arena并返回指针
    fn alloc(&mut self, data: Ptr::Data) -> Ptr {
        self.alloc_with(|_| data)
    }

    /// 释放指针指向的数据，指针无效时返回None
    fn dealloc(&mut self, ptr: Ptr) -> Option<Ptr::Data>;

    /// 解引用指针，指针无效时返回None
    fn deref(&self, ptr: Ptr) -> Option<&Ptr::Data>;

    /// 解引用指针返回可变引用，指针无效时返回None
    fn deref_mut(&mut self, ptr: Ptr) -> Option<&mut Ptr::Data>;
}

/// 泛型Arena指针，只存索引，按数据类型区分
pub struct GenericPtr<Data> {
    index: usize,
    _phantom: PhantomData<Data>,
}

impl<Data> GenericPtr<Data> {
    fn from_index(index: usize) -> Self {
        Self {
            index,
            _phantom: PhantomData,
        }
    }
}

/// 轻量索引特性，与具体Arena无关
pub trait Idx: Copy + Ord + Hash {
    /// 获取原始索引
    fn index(self) -> usize;
}

impl<Data> Idx for GenericPtr<Data> {
    fn index(self) -> usize {
        self.index
    }
}

// 手动实现以下特性，避免对Data产生多余的约束
impl<Data> Clone for GenericPtr<Data> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Data> Copy for GenericPtr<Data> {}

impl<Data> Hash for GenericPtr<Data> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl<Data> PartialEq for GenericPtr<Data> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<Data> Eq for GenericPtr<Data> {}

impl<Data> PartialOrd for GenericPtr<Data> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Data> Ord for GenericPtr<Data> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<Data> fmt::Debug for GenericPtr<Data> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "*{}", self.index)
    }
}

/// 泛型Arena的条目。空闲条目串成链表，最后释放的条目最先被复用
#[derive(Debug)]
pub enum GenericEntry<Data> {
    Vacant { next: Option<usize> },
    Occupied(Data),
}

/// 泛型Arena
#[derive(Debug)]
pub struct GenericArena<Data> {
    entries: Vec<GenericEntry<Data>>,
    free_head: Option<usize>,
}

impl<Data> Default for GenericArena<Data> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
        }
    }
}

impl<Data> GenericArena<Data> {
    /// 迭代存活数据的不可变引用
    pub fn iter(&self) -> impl Iterator<Item = &Data> {
        self.entries.iter().filter_map(|entry| match entry {
            GenericEntry::Occupied(value) => Some(value),
            GenericEntry::Vacant { .. } => None,
        })
    }
}

impl<Data> ArenaPtr for GenericPtr<Data> {
    type Arena = GenericArena<Data>;
    type Data = Data;
}

impl<Data> Arena<GenericPtr<Data>> for GenericArena<Data> {
    fn alloc_with<F>(&mut self, f: F) -> GenericPtr<Data>
    where
        F: FnOnce(GenericPtr<Data>) -> Data,
    {
        match self.free_head.take() {
            Some(index) => {
                let entry = &mut self.entries[index];
                self.free_head = match entry {
                    GenericEntry::Vacant { next } => *next,
                    // 空闲链表中不允许出现占用条目
                    GenericEntry::Occupied(_) => unreachable!(),
                };
                let ptr = GenericPtr::from_index(index);
                *entry = GenericEntry::Occupied(f(ptr));
                ptr
            }
            None => {
                let index = self.entries.len();
                let ptr = GenericPtr::from_index(index);
                self.entries.push(GenericEntry::Occupied(f(ptr)));
                ptr
            }
        }
    }

    fn dealloc(&mut self, ptr: GenericPtr<Data>) -> Option<Data> {
        let idx = ptr.index();

        if idx >= self.entries.len() {
            return None;
        }

        // 条目置空并挂到空闲链表头
        let old = mem::replace(
            &mut self.entries[idx],
            GenericEntry::Vacant {
                next: self.free_head,
            },
        );
        self.free_head = Some(idx);

        match old {
            GenericEntry::Vacant { .. } => None,
            GenericEntry::Occupied(data) => Some(data),
        }
    }

    fn deref(&self, ptr: GenericPtr<Data>) -> Option<&Data> {
        match self.entries.get(ptr.index())? {
            GenericEntry::Occupied(value) => Some(value),
            GenericEntry::Vacant { .. } => None,
        }
    }

    fn deref_mut(&mut self, ptr: GenericPtr<Data>) -> Option<&mut Data> {
        match self.entries.get_mut(ptr.index())? {
            GenericEntry::Occupied(value) => Some(value),
            GenericEntry::Vacant { .. } => None,
        }
    }
}

/// 数据内容加上类型标识得到的唯一哈希值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniqueArenaHash(u64);

impl UniqueArenaHash {
    pub fn new<T: Hash + 'static + ?Sized>(val: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        val.hash(&mut hasher);
        std::any::TypeId::of::<T>().hash(&mut hasher);
        UniqueArenaHash(hasher.finish())
    }
}

pub trait GetUniqueArenaHash {
    fn unique_arena_hash(&self) -> UniqueArenaHash;
}

impl<T> GetUniqueArenaHash for T
where
    T: Hash + 'static + ?Sized,
{
    fn unique_arena_hash(&self) -> UniqueArenaHash {
        UniqueArenaHash::new(self)
    }
}

/// 去重Arena，相等的数据只存一份，结构相等即指针相等
#[derive(Debug)]
pub struct UniqueArena<T>
where
    T: GetUniqueArenaHash + Eq,
{
    arena: GenericArena<T>,
    unique_map: HashMap<UniqueArenaHash, HashSet<GenericPtr<T>>>,
}

pub struct UniqueArenaPtr<T>(GenericPtr<T>);

impl<T> fmt::Debug for UniqueArenaPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueArenaPtr({})", self.0.index())
    }
}

impl<T> Clone for UniqueArenaPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UniqueArenaPtr<T> {}

impl<T> Hash for UniqueArenaPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> PartialEq for UniqueArenaPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for UniqueArenaPtr<T> {}

impl<T> Ord for UniqueArenaPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> PartialOrd for UniqueArenaPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Idx for UniqueArenaPtr<T> {
    fn index(self) -> usize {
        self.0.index()
    }
}

impl<T> Default for UniqueArena<T>
where
    T: GetUniqueArenaHash + Eq,
{
    fn default() -> Self {
        Self {
            arena: GenericArena::default(),
            unique_map: HashMap::default(),
        }
    }
}

impl<T> ArenaPtr for UniqueArenaPtr<T>
where
    T: GetUniqueArenaHash + Eq,
{
    type Arena = UniqueArena<T>;
    type Data = T;
}

impl<T> Arena<UniqueArenaPtr<T>> for UniqueArena<T>
where
    T: GetUniqueArenaHash + Eq,
{
    fn alloc_with<F>(&mut self, _: F) -> UniqueArenaPtr<T>
    where
        F: FnOnce(UniqueArenaPtr<T>) -> T,
    {
        panic!("UniqueArena does not support alloc_with");
    }

    fn alloc(&mut self, data: T) -> UniqueArenaPtr<T> {
        let hash = data.unique_arena_hash();
        if let Some(ptrs) = self.unique_map.get(&hash) {
            for &ptr in ptrs {
                if &data
                    == self
                        .arena
                        .deref(ptr)
                        .expect("invalid pointer present in unique map")
                {
                    return UniqueArenaPtr(ptr);
                }
            }
        }
        let ptr = self.arena.alloc(data);
        self.unique_map.entry(hash).or_default().insert(ptr);
        UniqueArenaPtr(ptr)
    }

    fn dealloc(&mut self, ptr: UniqueArenaPtr<T>) -> Option<T> {
        let data = self.arena.deref(ptr.0)?;
        let hash = data.unique_arena_hash();
        if !self.unique_map.entry(hash).or_default().remove(&ptr.0) {
            unreachable!("value present in arena but not in unique map");
        }
        Some(
            self.arena
                .dealloc(ptr.0)
                .unwrap_or_else(|| unreachable!("pointer dereferenced but cannot be deallocated")),
        )
    }

    fn deref(&self, ptr: UniqueArenaPtr<T>) -> Option<&T> {
        self.arena.deref(ptr.0)
    }

    fn deref_mut(&mut self, ptr: UniqueArenaPtr<T>) -> Option<&mut T> {
        self.arena.deref_mut(ptr.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_arena_reuses_freed_slots() {
        let mut arena: GenericArena<i32> = GenericArena::default();
        let a = arena.alloc(1);
        let b = arena.alloc(2);
        assert_eq!(arena.dealloc(a), Some(1));
        assert_eq!(arena.deref(a), None);
        let c = arena.alloc(3);
        // 最后释放的槽位最先复用
        assert_eq!(c.index(), a.index());
        assert_eq!(arena.deref(b), Some(&2));
        assert_eq!(arena.deref(c), Some(&3));
    }

    #[test]
    fn unique_arena_interns_equal_values() {
        let mut arena: UniqueArena<String> = UniqueArena::default();
        let a = arena.alloc("hello".to_string());
        let b = arena.alloc("hello".to_string());
        let c = arena.alloc("world".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
